//! Error types for agent-tracker-core

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the agent-tracker-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// IO error tied to a specific file
    #[error("IO error on {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A single JSONL line could not be decoded
    #[error("parse error in {source_name} line {line}: {message}")]
    Parse {
        source_name: String,
        line: usize,
        message: String,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// File watch backend error
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Session not found
    #[error("session not found: {0}")]
    SessionNotFound(String),
}

impl Error {
    /// Wrap an IO error with the path it happened on.
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::File {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for agent-tracker-core
pub type Result<T> = std::result::Result<T, Error>;

/// Callback that receives non-fatal errors from tailers and watchers.
///
/// Nothing in the ingestion path propagates errors to its caller; failures are
/// handed to a sink and the next file-change trigger retries naturally.
pub type ErrorSink = std::sync::Arc<dyn Fn(&Error) + Send + Sync>;

/// An [`ErrorSink`] that only logs.
pub fn log_errors() -> ErrorSink {
    std::sync::Arc::new(|e: &Error| tracing::warn!(error = %e, "ingestion error"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_error_display() {
        let err = Error::file(
            "/tmp/sessions.jsonl",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.to_string(), "IO error on /tmp/sessions.jsonl: gone");
    }

    #[test]
    fn test_parse_error_display() {
        let err = Error::Parse {
            source_name: "sessions.jsonl".to_string(),
            line: 2,
            message: "expected value".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "parse error in sessions.jsonl line 2: expected value"
        );
    }
}
