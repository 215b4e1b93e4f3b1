//! # courier
//!
//! A cURL-like HTTP client for humans.
//!
//! `courier [flags] [METHOD] URL [ITEM [ITEM]]`
//!
//! ## Features
//! - Items: `Name:Value` headers, `key=value` params or fields, `key:=json`
//!   raw JSON, `field@path` file uploads
//! - Method inference: GET, or POST once any item carries data
//! - JSON or form bodies, raw bodies from `--body` or stdin
//! - Colorized, pretty printed output with a selectable print mask
//! - Downloads with a progress bar
//! - Benchmark mode with a latency report
//!
//! ## Architecture
//! - Request layer - items are classified and folded into a `RequestSpec`
//! - Network layer - a `Transport` executes specs (reqwest in production)
//! - Output layer - the exchange is rendered for a terminal or a pipe
//! - App layer - ties one invocation together

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod network;
pub mod output;
pub mod progress;
pub mod request;

// Re-export commonly used types
pub use app::{App, Streams};
pub use cli::Cli;
pub use config::{Config, PrintMask, Settings};
pub use error::{Error, Result};
pub use models::{BodyMode, HttpMethod, RequestBody, RequestSpec, ResponseHead};
pub use network::{HttpResponse, ReqwestTransport, Transport};
pub use output::ResponseFormatter;
pub use progress::{ProgressBar, ProgressReporter};
pub use request::{ItemClassifier, RequestBuilder};
