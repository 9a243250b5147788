//! Error types for AssetPilot.
//!
//! Library crates use [`AssetPilotError`] via `thiserror`.
//! The CLI app wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all AssetPilot operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetPilotError {
    /// Configuration loading or validation error (missing API key,
    /// missing required sheet column, malformed config file).
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level network failure (connect, timeout, body read).
    #[error("network error: {0}")]
    Network(String),

    /// HTTP-level failure reported by a completion API.
    #[error("api error{}: {message}", status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Api {
        status: Option<u16>,
        message: String,
    },

    /// Response parsing or normalization error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Spreadsheet adapter error (read, write, formatting).
    #[error("sheet error: {0}")]
    Sheet(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AssetPilotError>;

impl AssetPilotError {
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

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The HTTP-like status code carried by API failures, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => *status,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = AssetPilotError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = AssetPilotError::Api {
            status: Some(401),
            message: "invalid key".into(),
        };
        assert_eq!(err.to_string(), "api error (status 401): invalid key");
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn status_absent_for_non_api_errors() {
        let err = AssetPilotError::Network("connection reset".into());
        assert_eq!(err.status(), None);
    }
}
