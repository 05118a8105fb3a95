//! Error types for Strategy Scout.
//!
//! Library crates use [`ScoutError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Strategy Scout operations.
#[derive(Debug, thiserror::Error)]
pub enum ScoutError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error during discovery or delivery.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed artifact or response payload.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Strategy store read/write error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Similarity engine computation error.
    #[error("similarity error: {0}")]
    Similarity(String),

    /// Summarizer bridge error (spawn, protocol, or exit status).
    #[error("summarize error: {0}")]
    Summarize(String),

    /// Digest delivery error.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (schema mismatch, out-of-range value, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Illegal pipeline state transition.
    #[error("invalid transition from {from} on {event}")]
    Transition { from: String, event: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScoutError>;

impl ScoutError {
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
        let err = ScoutError::config("duplicate_threshold out of range");
        assert_eq!(
            err.to_string(),
            "config error: duplicate_threshold out of range"
        );

        let err = ScoutError::validation("schema_version 99 not supported");
        assert!(err.to_string().contains("schema_version 99"));

        let err = ScoutError::Transition {
            from: "dedup".into(),
            event: "completed(score)".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid transition from dedup on completed(score)"
        );
    }

    #[test]
    fn io_error_keeps_path() {
        let err = ScoutError::io(
            "/tmp/strategy_db.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("strategy_db.json"));
    }
}
