//! Terminal progress bar for downloads and benchmark runs
//!
//! [`ProgressBar`] holds the configuration, [`ProgressBar::start`] turns it
//! into a running [`ProgressReporter`] and [`ProgressReporter::finish`] stops
//! it after a final draw. The counter is a single atomic, so any number of
//! [`ProgressCounter`] clones may add to it while the ticker task reads it.

use std::io::{self, Write};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use tokio::io::AsyncWrite;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::constants::{DEFAULT_REFRESH_RATE, DEFAULT_TERMINAL_WIDTH};

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;
const TB: u64 = GB * 1024;

/// What the counter counts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Unit {
    #[default]
    Bytes,
    Requests,
}

/// Glyphs of the bar
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BarStyle {
    pub start: &'static str,
    pub end: &'static str,
    pub empty: &'static str,
    pub filled: &'static str,
    pub leading: &'static str,
}

impl Default for BarStyle {
    fn default() -> Self {
        BarStyle {
            start: "[",
            end: "]",
            empty: "_",
            filled: "=",
            leading: ">",
        }
    }
}

/// Everything one redraw needs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub current: u64,
    /// 0 when unknown
    pub total: u64,
    pub elapsed: Duration,
    pub finished: bool,
    pub unit: Unit,
}

/// Format a byte count with binary prefixes. A unit is used only once the
/// value is strictly greater than its threshold, so 1024 is `1024 B`.
pub fn format_bytes(n: u64) -> String {
    let f = n as f64;
    if n > TB {
        format!("{:.2} TB", f / TB as f64)
    } else if n > GB {
        format!("{:.2} GB", f / GB as f64)
    } else if n > MB {
        format!("{:.2} MB", f / MB as f64)
    } else if n > KB {
        format!("{:.2} KB", f / KB as f64)
    } else {
        format!("{} B", n)
    }
}

/// `1h2m3s` style, whole seconds
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h{}m{}s", h, m, s)
    } else if m > 0 {
        format!("{}m{}s", m, s)
    } else {
        format!("{}s", s)
    }
}

fn format_amount(unit: Unit, n: u64) -> String {
    match unit {
        Unit::Bytes => format_bytes(n),
        Unit::Requests => format!("{} req", n),
    }
}

fn format_speed(unit: Unit, per_sec: f64) -> String {
    match unit {
        Unit::Bytes => format!("{}/s", format_bytes(per_sec as u64)),
        Unit::Requests => format!("{:.1} req/s", per_sec),
    }
}

/// Render one progress line, padded to `width`.
///
/// Layout: `counters [bar] percent speed time`. Percent, bar and ETA are
/// left out when the total is unknown.
pub fn render(snap: &Snapshot, style: &BarStyle, width: usize) -> String {
    let known = snap.total > 0;
    let elapsed = snap.elapsed.as_secs_f64();

    let percent_box = if known {
        format!(" {:.2}% ", snap.current as f64 / snap.total as f64 * 100.0)
    } else {
        String::new()
    };

    let counters_box = if known {
        format!(
            "{} / {} ",
            format_amount(snap.unit, snap.current),
            format_amount(snap.unit, snap.total)
        )
    } else {
        format!("{} ", format_amount(snap.unit, snap.current))
    };

    let time_box = if snap.finished {
        format_duration(snap.elapsed)
    } else if known && snap.current > 0 {
        let remaining = snap.total.saturating_sub(snap.current) as f64;
        let eta = remaining * elapsed / snap.current as f64;
        format_duration(Duration::try_from_secs_f64(eta).unwrap_or(Duration::MAX))
    } else {
        String::new()
    };

    let speed_box = if snap.current > 0 && elapsed > 0.0 {
        format!("{} ", format_speed(snap.unit, snap.current as f64 / elapsed))
    } else {
        String::new()
    };

    let mut bar_box = String::new();
    if known {
        let used = counters_box.len()
            + style.start.len()
            + style.end.len()
            + percent_box.len()
            + time_box.len()
            + speed_box.len();
        let size = width.saturating_sub(used);
        if size > 0 {
            let ratio = snap.current as f64 / snap.total as f64;
            let filled = ((ratio * size as f64).ceil() as usize).min(size);
            let empty = size - filled;
            bar_box.push_str(style.start);
            if empty == 0 {
                bar_box.push_str(&style.filled.repeat(filled));
            } else if filled > 0 {
                bar_box.push_str(&style.filled.repeat(filled - 1));
                bar_box.push_str(style.leading);
            }
            bar_box.push_str(&style.empty.repeat(empty));
            bar_box.push_str(style.end);
        }
    }

    let mut out = format!(
        "{}{}{}{}{}",
        counters_box, bar_box, percent_box, speed_box, time_box
    );
    if out.len() < width {
        out.push_str(&" ".repeat(width - out.len()));
    }
    out
}

/// Current terminal width, or the default when stdout has no size
pub fn terminal_width() -> usize {
    crossterm::terminal::size()
        .map(|(cols, _)| cols as usize)
        .ok()
        .filter(|cols| *cols > 0)
        .unwrap_or(DEFAULT_TERMINAL_WIDTH)
}

type Sink = Box<dyn Write + Send>;

struct Shared {
    current: AtomicU64,
    total: u64,
    unit: Unit,
    width: usize,
    style: BarStyle,
    started: OnceLock<Instant>,
    finished: AtomicBool,
    sink: Mutex<Sink>,
}

impl Shared {
    fn elapsed(&self) -> Duration {
        self.started
            .get()
            .map(|start| start.elapsed())
            .unwrap_or_default()
    }

    fn draw(&self, current: u64) -> io::Result<()> {
        let snap = Snapshot {
            current,
            total: self.total,
            elapsed: self.elapsed(),
            finished: self.finished.load(Ordering::Acquire),
            unit: self.unit,
        };
        let line = render(&snap, &self.style, self.width);
        let mut sink = match self.sink.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        write!(sink, "\r{}", line)?;
        if snap.finished {
            writeln!(sink)?;
        }
        sink.flush()
    }
}

/// Progress bar configuration, not yet running
#[derive(Clone, Debug)]
pub struct ProgressBar {
    total: u64,
    unit: Unit,
    width: Option<usize>,
    refresh_rate: Duration,
}

impl ProgressBar {
    /// `total` of 0 means unknown
    pub fn new(total: u64) -> Self {
        ProgressBar {
            total,
            unit: Unit::Bytes,
            width: None,
            refresh_rate: DEFAULT_REFRESH_RATE,
        }
    }

    pub fn unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    pub fn width(mut self, width: usize) -> Self {
        self.width = Some(width);
        self
    }

    pub fn refresh_rate(mut self, rate: Duration) -> Self {
        self.refresh_rate = rate;
        self
    }

    /// Record the start time and spawn the redraw loop. Must be called from
    /// within a tokio runtime.
    pub fn start(self, sink: impl Write + Send + 'static) -> ProgressReporter {
        let shared = Arc::new(Shared {
            current: AtomicU64::new(0),
            total: self.total,
            unit: self.unit,
            width: self.width.unwrap_or_else(terminal_width),
            style: BarStyle::default(),
            started: OnceLock::new(),
            finished: AtomicBool::new(false),
            sink: Mutex::new(Box::new(sink)),
        });
        let _ = shared.started.set(Instant::now());

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let ticker = Arc::clone(&shared);
        let mut interval = tokio::time::interval(self.refresh_rate);
        let handle = tokio::spawn(async move {
            let mut last = 0;
            loop {
                tokio::select! {
                    biased;

                    _ = &mut stop_rx => break,
                    _ = interval.tick() => {
                        let current = ticker.current.load(Ordering::Acquire);
                        if current != last {
                            if let Err(e) = ticker.draw(current) {
                                tracing::debug!(error = %e, "progress redraw failed");
                            }
                            last = current;
                        }
                    }
                }
            }
        });

        ProgressReporter {
            shared,
            ticker: Some((stop_tx, handle)),
        }
    }
}

/// Cloneable handle for adding to a running reporter
#[derive(Clone)]
pub struct ProgressCounter {
    shared: Arc<Shared>,
}

impl ProgressCounter {
    /// Add `n`, returning the new count. Ignored once finished.
    pub fn add(&self, n: u64) -> u64 {
        if self.shared.finished.load(Ordering::Acquire) {
            return self.current();
        }
        self.shared.current.fetch_add(n, Ordering::AcqRel) + n
    }

    pub fn current(&self) -> u64 {
        self.shared.current.load(Ordering::Acquire)
    }
}

/// A running progress bar
pub struct ProgressReporter {
    shared: Arc<Shared>,
    ticker: Option<(oneshot::Sender<()>, JoinHandle<()>)>,
}

impl ProgressReporter {
    pub fn counter(&self) -> ProgressCounter {
        ProgressCounter {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn add(&self, n: u64) -> u64 {
        self.counter().add(n)
    }

    pub fn current(&self) -> u64 {
        self.shared.current.load(Ordering::Acquire)
    }

    /// Stop the redraw loop and draw once more with the total elapsed time.
    /// Returns the final count and elapsed time.
    pub async fn finish(mut self) -> io::Result<(u64, Duration)> {
        if let Some((stop_tx, handle)) = self.ticker.take() {
            let _ = stop_tx.send(());
            let _ = handle.await;
        }
        self.shared.finished.store(true, Ordering::Release);
        let current = self.current();
        self.shared.draw(current)?;
        Ok((current, self.shared.elapsed()))
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some((_, handle)) = self.ticker.take() {
            handle.abort();
        }
    }
}

/// Writer that forwards to `inner` and counts what was written
pub struct ProgressWriter<W> {
    inner: W,
    counter: ProgressCounter,
}

impl<W> ProgressWriter<W> {
    pub fn new(inner: W, counter: ProgressCounter) -> Self {
        ProgressWriter { inner, counter }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for ProgressWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_write(cx, buf) {
            Poll::Ready(Ok(n)) => {
                this.counter.add(n as u64);
                Poll::Ready(Ok(n))
            }
            other => other,
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
