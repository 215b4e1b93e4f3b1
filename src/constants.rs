//! Application constants
//!
//! Centralized location for magic strings and configuration defaults.

use std::time::Duration;

/// Application name, used as binary name and User-Agent product
pub const APP_NAME: &str = "courier";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Encodings requested on every request; reqwest decodes them transparently
pub const DEFAULT_ACCEPT_ENCODING: &str = "gzip, deflate";

/// Media type sent and accepted in JSON mode
pub const JSON_MEDIA_TYPE: &str = "application/json";

/// Media type of url-encoded form bodies
pub const FORM_MEDIA_TYPE: &str = "application/x-www-form-urlencoded";

/// Response content types matching this pattern are treated as JSON
pub const JSON_CONTENT_PATTERN: &str = r"application/(.*)json";

/// Host used by the `:port/path` URL shorthand
pub const LOCALHOST: &str = "http://localhost";

/// Connect and read timeout when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// How often the progress bar checks the counter
pub const DEFAULT_REFRESH_RATE: Duration = Duration::from_millis(200);

/// Progress bar width when the terminal size can't be queried
pub const DEFAULT_TERMINAL_WIDTH: usize = 123;

/// Benchmark defaults
pub const DEFAULT_BENCH_REQUESTS: usize = 1000;
pub const DEFAULT_BENCH_CONCURRENCY: usize = 100;

/// File name used for downloads when the URL has no usable path segment
pub const DEFAULT_DOWNLOAD_NAME: &str = "index.html";

/// Settings file location under the user's config directory
pub const CONFIG_DIR_NAME: &str = "courier";
pub const CONFIG_FILE_NAME: &str = "config.yaml";

pub fn user_agent() -> String {
    format!("{}/{}", APP_NAME, APP_VERSION)
}
