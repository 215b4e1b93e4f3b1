//! Benchmark mode - fire `N` requests from `C` concurrent workers
//!
//! Workers share an atomic ticket counter and keep taking tickets until `N`
//! have been issued. Each result goes over a channel and is aggregated once
//! every worker has finished; no ordering between requests is kept.

use futures_util::StreamExt;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::constants::{DEFAULT_BENCH_CONCURRENCY, DEFAULT_BENCH_REQUESTS};
use crate::error::{Error, Result};
use crate::models::RequestSpec;
use crate::network::client::{BodyStream, Transport};
use crate::progress::{format_bytes, ProgressCounter};

/// Distinct error messages listed in the report
const MAX_REPORTED_ERRORS: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BenchOptions {
    pub requests: usize,
    pub concurrency: usize,
}

impl Default for BenchOptions {
    fn default() -> Self {
        BenchOptions {
            requests: DEFAULT_BENCH_REQUESTS,
            concurrency: DEFAULT_BENCH_CONCURRENCY,
        }
    }
}

impl BenchOptions {
    /// Reject empty runs and clamp the worker count to the request count
    pub fn validate(self) -> Result<Self> {
        if self.requests == 0 {
            return Err(Error::usage("bench needs at least one request (-b.N)"));
        }
        if self.concurrency == 0 {
            return Err(Error::usage("bench needs at least one worker (-b.C)"));
        }
        Ok(BenchOptions {
            requests: self.requests,
            concurrency: self.concurrency.min(self.requests),
        })
    }
}

/// Outcome of one request
#[derive(Clone, Debug)]
pub struct Sample {
    pub latency: Duration,
    /// Status code, or the transport error message
    pub outcome: std::result::Result<u16, String>,
    pub bytes: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LatencyStats {
    pub min: Duration,
    pub mean: Duration,
    pub max: Duration,
    pub p50: Duration,
    pub p90: Duration,
    pub p99: Duration,
}

impl LatencyStats {
    fn from_latencies(mut latencies: Vec<Duration>) -> Option<Self> {
        if latencies.is_empty() {
            return None;
        }
        latencies.sort_unstable();
        let total: Duration = latencies.iter().sum();
        Some(LatencyStats {
            min: latencies[0],
            mean: total / latencies.len() as u32,
            max: latencies[latencies.len() - 1],
            p50: percentile(&latencies, 50.0),
            p90: percentile(&latencies, 90.0),
            p99: percentile(&latencies, 99.0),
        })
    }
}

/// Nearest-rank percentile of a sorted, non-empty slice
fn percentile(sorted: &[Duration], p: f64) -> Duration {
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Aggregated results of a run
#[derive(Clone, Debug)]
pub struct BenchReport {
    pub concurrency: usize,
    pub elapsed: Duration,
    pub completed: usize,
    pub failed: usize,
    pub bytes: u64,
    pub latency: Option<LatencyStats>,
    pub statuses: BTreeMap<u16, usize>,
    pub errors: BTreeMap<String, usize>,
}

impl BenchReport {
    pub fn from_samples(samples: &[Sample], elapsed: Duration, concurrency: usize) -> Self {
        let mut statuses = BTreeMap::new();
        let mut errors = BTreeMap::new();
        let mut latencies = Vec::with_capacity(samples.len());
        let mut bytes = 0;

        for sample in samples {
            match &sample.outcome {
                Ok(status) => {
                    *statuses.entry(*status).or_insert(0) += 1;
                    latencies.push(sample.latency);
                    bytes += sample.bytes;
                }
                Err(message) => *errors.entry(message.clone()).or_insert(0) += 1,
            }
        }

        BenchReport {
            concurrency,
            elapsed,
            completed: latencies.len(),
            failed: samples.len() - latencies.len(),
            bytes,
            latency: LatencyStats::from_latencies(latencies),
            statuses,
            errors,
        }
    }

    pub fn total(&self) -> usize {
        self.completed + self.failed
    }

    pub fn requests_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total() as f64 / secs
        } else {
            0.0
        }
    }

    pub fn render(&self) -> String {
        let ms = |d: Duration| format!("{:.2}ms", d.as_secs_f64() * 1000.0);
        let mut out = String::new();
        let _ = writeln!(out, "Concurrency Level:      {}", self.concurrency);
        let _ = writeln!(out, "Time taken for tests:   {:.3} seconds", self.elapsed.as_secs_f64());
        let _ = writeln!(out, "Complete requests:      {}", self.completed);
        let _ = writeln!(out, "Failed requests:        {}", self.failed);
        let _ = writeln!(out, "Total transferred:      {}", format_bytes(self.bytes));
        let _ = writeln!(
            out,
            "Requests per second:    {:.2} [#/sec] (mean)",
            self.requests_per_sec()
        );
        if let Some(lat) = &self.latency {
            let _ = writeln!(
                out,
                "Latency (min/mean/max): {} / {} / {}",
                ms(lat.min),
                ms(lat.mean),
                ms(lat.max)
            );
            let _ = writeln!(
                out,
                "Latency percentiles:    p50 {}, p90 {}, p99 {}",
                ms(lat.p50),
                ms(lat.p90),
                ms(lat.p99)
            );
        }
        if !self.statuses.is_empty() {
            let _ = writeln!(out, "Status codes:");
            for (status, count) in &self.statuses {
                let _ = writeln!(out, "  {}: {}", status, count);
            }
        }
        if !self.errors.is_empty() {
            let _ = writeln!(out, "Errors:");
            for (message, count) in self.errors.iter().take(MAX_REPORTED_ERRORS) {
                let _ = writeln!(out, "  {} ({}x)", message, count);
            }
        }
        out
    }
}

/// Run the benchmark. Each finished request adds one to `progress`.
pub async fn run<T: Transport + 'static>(
    transport: Arc<T>,
    spec: Arc<RequestSpec>,
    options: BenchOptions,
    progress: Option<ProgressCounter>,
) -> Result<BenchReport> {
    let options = options.validate()?;
    tracing::info!(
        requests = options.requests,
        concurrency = options.concurrency,
        url = %spec.url,
        "Starting benchmark"
    );

    let issued = Arc::new(AtomicUsize::new(0));
    let (sample_tx, mut sample_rx) = mpsc::unbounded_channel::<Sample>();
    let start = Instant::now();

    let mut workers = JoinSet::new();
    for worker in 0..options.concurrency {
        let transport = Arc::clone(&transport);
        let spec = Arc::clone(&spec);
        let issued = Arc::clone(&issued);
        let sample_tx = sample_tx.clone();
        let progress = progress.clone();

        workers.spawn(async move {
            while issued.fetch_add(1, Ordering::AcqRel) < options.requests {
                let sample = execute_one(transport.as_ref(), &spec).await;
                if let Some(counter) = &progress {
                    counter.add(1);
                }
                if sample_tx.send(sample).is_err() {
                    break;
                }
            }
            tracing::debug!(worker, "bench worker done");
        });
    }
    drop(sample_tx);

    while let Some(result) = workers.join_next().await {
        if let Err(e) = result {
            tracing::warn!(error = %e, "bench worker failed");
        }
    }
    let elapsed = start.elapsed();

    let mut samples = Vec::with_capacity(options.requests);
    while let Some(sample) = sample_rx.recv().await {
        samples.push(sample);
    }
    Ok(BenchReport::from_samples(&samples, elapsed, options.concurrency))
}

async fn execute_one<T: Transport>(transport: &T, spec: &RequestSpec) -> Sample {
    let start = Instant::now();
    let (outcome, bytes) = match transport.execute(spec).await {
        Ok(response) => {
            let status = response.head.status;
            match drain(response.body).await {
                Ok(bytes) => (Ok(status), bytes),
                Err(e) => (Err(e.to_string()), 0),
            }
        }
        Err(e) => (Err(e.to_string()), 0),
    };
    Sample {
        latency: start.elapsed(),
        outcome,
        bytes,
    }
}

async fn drain(mut body: BodyStream) -> Result<u64> {
    let mut bytes = 0;
    while let Some(chunk) = body.next().await {
        bytes += chunk?.len() as u64;
    }
    Ok(bytes)
}
