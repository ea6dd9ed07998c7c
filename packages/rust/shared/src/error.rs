//! Error types for Gatherbox.
//!
//! Library crates use [`GatherError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Gatherbox operations.
#[derive(Debug, thiserror::Error)]
pub enum GatherError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while talking to the remote source.
    #[error("network error: {0}")]
    Network(String),

    /// A fetch did not complete within the configured timeout.
    #[error("timed out after {secs}s: {target}")]
    Timeout { target: String, secs: u64 },

    /// Markup could not be turned into a node tree.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// A selector string is malformed.
    #[error("invalid selector {selector:?}: {message}")]
    Selector { selector: String, message: String },

    /// The record extractor could not produce records from a document.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// A record violates the catalog invariants (e.g. no printings).
    #[error("invalid record {name:?}: {reason}")]
    InvalidRecord { name: String, reason: String },

    /// The amount of discovery work could not be determined.
    #[error("discovery error: {0}")]
    Discovery(String),

    /// The checkpoint file could not be read, decoded, or written.
    #[error("checkpoint error at {path:?}: {message}")]
    Checkpoint { path: PathBuf, message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A pipeline task panicked or was aborted.
    #[error("task error: {0}")]
    Task(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, GatherError>;

impl GatherError {
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

    /// Create a selector error for the given selector source.
    pub fn selector(selector: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: msg.into(),
        }
    }

    /// Create an invalid-record error.
    pub fn invalid_record(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a checkpoint error for the given path.
    pub fn checkpoint(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Checkpoint {
            path: path.into(),
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

    /// Whether this error must abort the whole run.
    ///
    /// Per-item failures (network, timeout, parse, extraction, invalid
    /// record) are absorbed by the stage that saw them.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::Discovery(_)
                | Self::Checkpoint { .. }
                | Self::Io { .. }
                | Self::Selector { .. }
                | Self::Task(_)
        )
    }
}
