//! Error types for roamweb.
//!
//! Library crates use [`RoamWebError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all roamweb operations.
#[derive(Debug, thiserror::Error)]
pub enum RoamWebError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Note database could not be opened or read.
    #[error("storage error: {0}")]
    Storage(String),

    /// Note markup could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Page template rendering or artifact serialization failed.
    #[error("render error: {0}")]
    Render(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The notes directory could not be watched for changes.
    #[error("watch error: {0}")]
    Watch(String),

    /// Data validation error (invalid pattern, malformed record, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RoamWebError>;

impl RoamWebError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = RoamWebError::config("recent_count must be positive");
        assert_eq!(err.to_string(), "config error: recent_count must be positive");

        let err = RoamWebError::Storage("no such table: nodes".into());
        assert!(err.to_string().contains("no such table"));
    }

    #[test]
    fn io_error_carries_path() {
        let err = RoamWebError::io(
            "/tmp/notes/a.org",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        let msg = err.to_string();
        assert!(msg.contains("a.org"));
        assert!(msg.contains("gone"));
    }
}
