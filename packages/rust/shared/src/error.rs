//! Error types for the campaign migrator.
//!
//! Library crates use [`MigratorError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all migration operations.
#[derive(Debug, thiserror::Error)]
pub enum MigratorError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The source document cannot be migrated as given.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// No deliverable (non-control) variation exists for a channel.
    #[error("no deliverable variations found for channel {channel}")]
    NoVariations { channel: String },

    /// Reading from the source platform failed.
    #[error("source read failed for {url}: {message}")]
    RemoteFetch { url: String, message: String },

    /// The target platform rejected or errored on a write.
    #[error("target write failed (status {status:?}): {body}")]
    RemoteWrite { status: Option<u16>, body: String },

    /// Low-level network/HTTP error (client construction, transport).
    #[error("network error: {0}")]
    Network(String),

    /// A single asset could not be re-hosted. Never escapes the asset pipeline.
    #[error("asset error: {0}")]
    Asset(String),

    /// JSON decoding error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MigratorError>;

impl MigratorError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a source read error for `url`.
    pub fn remote_fetch(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::RemoteFetch {
            url: url.into(),
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

    /// Whether this error means the input itself is unusable.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::NoVariations { .. } | Self::Parse { .. }
        )
    }

    /// HTTP-style status used when reporting this error at the outer boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            _ if self.is_validation() => 400,
            Self::RemoteWrite { .. } | Self::RemoteFetch { .. } => 502,
            _ => 500,
        }
    }
}

impl From<serde_json::Error> for MigratorError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse(err.to_string())
    }
}
