//! Configuration - settings file and the resolved run configuration
//!
//! Settings come from an optional YAML file under the user's config
//! directory. Command line flags are merged over them once, in
//! [`crate::cli::Cli::into_config`], and the resulting [`Config`] is never
//! mutated afterwards.

use serde::Deserialize;
use std::fs;
use std::io;
use std::ops::BitOr;
use std::path::{Path, PathBuf};

use crate::constants::{CONFIG_DIR_NAME, CONFIG_FILE_NAME};
use crate::error::{Error, Result};
use crate::models::{BodyMode, Credentials, TransportOptions};
use crate::network::bench::BenchOptions;

/// Which parts of the exchange get printed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrintMask(u8);

impl PrintMask {
    pub const REQUEST_HEADERS: PrintMask = PrintMask(1);
    pub const REQUEST_BODY: PrintMask = PrintMask(1 << 1);
    pub const RESPONSE_HEADERS: PrintMask = PrintMask(1 << 2);
    pub const RESPONSE_BODY: PrintMask = PrintMask(1 << 3);

    pub const fn empty() -> Self {
        PrintMask(0)
    }

    pub const fn all() -> Self {
        PrintMask(0b1111)
    }

    /// `H` request headers, `B` request body, `h` response headers,
    /// `b` response body. `A` anywhere selects everything; other letters
    /// are ignored.
    pub fn parse(s: &str) -> Self {
        if s.contains('A') {
            return PrintMask::all();
        }
        s.chars().fold(PrintMask::empty(), |mask, c| match c {
            'H' => mask | PrintMask::REQUEST_HEADERS,
            'B' => mask | PrintMask::REQUEST_BODY,
            'h' => mask | PrintMask::RESPONSE_HEADERS,
            'b' => mask | PrintMask::RESPONSE_BODY,
            _ => mask,
        })
    }

    pub fn contains(self, other: PrintMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for PrintMask {
    fn default() -> Self {
        PrintMask::all()
    }
}

impl BitOr for PrintMask {
    type Output = PrintMask;

    fn bitor(self, rhs: PrintMask) -> PrintMask {
        PrintMask(self.0 | rhs.0)
    }
}

/// Contents of `config.yaml`. Every key is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub pretty: Option<bool>,
    pub print: Option<String>,
    pub form: Option<bool>,
    pub insecure: Option<bool>,
    pub proxy: Option<String>,
    pub timeout_secs: Option<u64>,
    /// `Name:Value` items sent with every request
    pub headers: Vec<String>,
}

impl Settings {
    /// `<config_dir>/courier/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load settings. An explicit path has to exist; the default file is
    /// optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Settings::load_from(path),
            None => match Settings::default_path() {
                Some(path) => match Settings::load_from(&path) {
                    Err(Error::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                        Ok(Settings::default())
                    }
                    other => other,
                },
                None => Ok(Settings::default()),
            },
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        if content.trim().is_empty() {
            return Ok(Settings::default());
        }
        let settings = serde_yaml::from_str(&content).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }
}

/// Everything one run needs, resolved from flags and settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub mode: BodyMode,
    pub pretty: bool,
    pub print: PrintMask,
    pub auth: Option<Credentials>,
    pub transport: TransportOptions,
    pub download: bool,
    /// Download destination overriding the derived file name
    pub output: Option<PathBuf>,
    /// Set when running in benchmark mode
    pub bench: Option<BenchOptions>,
    /// Raw body from `--body`
    pub body: Option<String>,
    pub ignore_stdin: bool,
    /// Items from the settings file, applied before `args`
    pub default_items: Vec<String>,
    /// Positional arguments: `[METHOD] URL [ITEM ...]`
    pub args: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mode: BodyMode::Json,
            pretty: true,
            print: PrintMask::all(),
            auth: None,
            transport: TransportOptions::default(),
            download: false,
            output: None,
            bench: None,
            body: None,
            ignore_stdin: false,
            default_items: Vec::new(),
            args: Vec::new(),
        }
    }
}
