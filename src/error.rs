//! Error types for courier.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad invocation: missing or malformed URL, malformed item, bad flag value.
    #[error("{0}")]
    Usage(String),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}", describe_transport(.0))]
    Transport(#[from] reqwest::Error),

    #[error("write failed: {0}")]
    Output(#[from] io::Error),

    #[error("invalid config file {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl Error {
    pub fn usage(message: impl Into<String>) -> Self {
        Error::Usage(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn decode(context: impl Into<String>, source: serde_json::Error) -> Self {
        Error::Decode {
            context: context.into(),
            source,
        }
    }

    /// Process exit code for this error. Usage problems exit with 2, like
    /// the usage text itself; every other failure exits with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Usage(_) => 2,
            _ => 1,
        }
    }
}

fn describe_transport(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("Request timed out: {}", e)
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else {
        format!("Request failed: {}", e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_exits_with_two() {
        assert_eq!(Error::usage("Miss the URL").exit_code(), 2);
    }

    #[test]
    fn test_io_error_message_names_path() {
        let err = Error::io(
            "/tmp/missing.json",
            io::Error::new(io::ErrorKind::NotFound, "not found"),
        );
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("/tmp/missing.json"));
    }
}
