//! Command line interface
//!
//! `courier [flags] [METHOD] URL [ITEM [ITEM]]`. Flags may also be written
//! with a single dash (`-json`, `-print=hb`, `-b.N=10`).

use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::config::{Config, PrintMask, Settings};
use crate::constants::{DEFAULT_BENCH_CONCURRENCY, DEFAULT_BENCH_REQUESTS, DEFAULT_TIMEOUT};
use crate::error::{Error, Result};
use crate::models::{BodyMode, Credentials, TransportOptions};
use crate::network::bench::BenchOptions;

/// Long flag names accepted after a single dash
const LONG_FLAGS: &[&str] = &[
    "json",
    "form",
    "pretty",
    "print",
    "auth",
    "proxy",
    "insecure",
    "download",
    "output",
    "bench",
    "b.N",
    "b.C",
    "body",
    "timeout",
    "ignore-stdin",
    "verbose",
    "config",
    "version",
    "help",
];

#[derive(Parser, Debug)]
#[command(name = "courier")]
#[command(about = "cURL-like HTTP client for humans")]
#[command(override_usage = "courier [flags] [METHOD] URL [ITEM [ITEM]]")]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Send the data as a JSON object (default)
    #[arg(short, long, conflicts_with = "form")]
    pub json: bool,

    /// Submit the data as a form
    #[arg(short, long)]
    pub form: bool,

    /// Pretty print JSON responses, `-pretty=false` turns it off
    #[arg(short, long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub pretty: Option<bool>,

    /// What to print: H request headers, B request body, h response headers, b response body, A all
    #[arg(long, value_name = "MASK")]
    pub print: Option<String>,

    /// HTTP basic authentication
    #[arg(short, long, value_name = "USER[:PASS]")]
    pub auth: Option<String>,

    /// Proxy URL
    #[arg(long, value_name = "PROXY_URL")]
    pub proxy: Option<String>,

    /// Allow connections to SSL sites without certs
    #[arg(short, long)]
    pub insecure: bool,

    /// Download the response body to a file
    #[arg(short, long)]
    pub download: bool,

    /// Download destination
    #[arg(short, long, value_name = "PATH", requires = "download")]
    pub output: Option<PathBuf>,

    /// Send bench requests to the URL
    #[arg(short, long, conflicts_with = "download")]
    pub bench: bool,

    /// Number of bench requests to run
    #[arg(long = "b.N", value_name = "N", default_value_t = DEFAULT_BENCH_REQUESTS)]
    pub bench_requests: usize,

    /// Number of bench requests to run concurrently
    #[arg(long = "b.C", value_name = "C", default_value_t = DEFAULT_BENCH_CONCURRENCY)]
    pub bench_concurrency: usize,

    /// Raw data sent as the body
    #[arg(long, value_name = "RAW")]
    pub body: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Don't read the request body from stdin
    #[arg(long)]
    pub ignore_stdin: bool,

    /// Enable debug logging
    #[arg(long)]
    pub verbose: bool,

    /// Settings file to use instead of the default one
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the version number
    #[arg(short = 'v', long)]
    pub version: bool,

    /// [METHOD] URL [ITEM ...]
    #[arg(value_name = "ARGS")]
    pub args: Vec<String>,
}

impl Cli {
    /// Parse after rewriting single-dash long flags
    pub fn parse_args<I, T>(args: I) -> std::result::Result<Cli, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Cli::try_parse_from(normalize_args(args))
    }

    /// Merge flags over the settings file. Flags win.
    pub fn into_config(self, settings: Settings) -> Result<Config> {
        let mode = if self.form || (!self.json && settings.form.unwrap_or(false)) {
            BodyMode::Form
        } else {
            BodyMode::Json
        };

        let proxy = self
            .proxy
            .or(settings.proxy)
            .map(|raw| {
                Url::parse(&raw)
                    .map_err(|e| Error::usage(format!("invalid proxy URL {}: {}", raw, e)))
            })
            .transpose()?;

        let timeout = match self.timeout.or(settings.timeout_secs) {
            Some(0) => return Err(Error::usage("timeout must be at least one second")),
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_TIMEOUT,
        };

        let bench = if self.bench {
            Some(
                BenchOptions {
                    requests: self.bench_requests,
                    concurrency: self.bench_concurrency,
                }
                .validate()?,
            )
        } else {
            None
        };

        Ok(Config {
            mode,
            pretty: self.pretty.or(settings.pretty).unwrap_or(true),
            print: self
                .print
                .or(settings.print)
                .map(|mask| PrintMask::parse(&mask))
                .unwrap_or_default(),
            auth: self.auth.as_deref().map(Credentials::parse),
            transport: TransportOptions {
                proxy,
                insecure: self.insecure || settings.insecure.unwrap_or(false),
                timeout,
            },
            download: self.download,
            output: self.output,
            bench,
            body: self.body,
            ignore_stdin: self.ignore_stdin,
            default_items: settings.headers,
            args: self.args,
        })
    }
}

/// Rewrite `-name[=value]` to `--name[=value]` for known long flags.
/// Everything after `--` is left alone.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut passthrough = false;
    args.into_iter()
        .map(Into::into)
        .map(|arg: OsString| {
            if passthrough {
                return arg;
            }
            let Some(text) = arg.to_str() else {
                return arg;
            };
            if text == "--" {
                passthrough = true;
                return arg;
            }
            match text.strip_prefix('-') {
                Some(rest) if !rest.starts_with('-') => {
                    let name = rest.split_once('=').map_or(rest, |(name, _)| name);
                    if LONG_FLAGS.contains(&name) {
                        OsString::from(format!("-{}", text))
                    } else {
                        arg
                    }
                }
                _ => arg,
            }
        })
        .collect()
}
