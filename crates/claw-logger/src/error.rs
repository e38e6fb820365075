//! Error types for the logger.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while configuring or driving the logger.
///
/// Nothing on the hot logging path returns these to the caller; write and
/// rotation failures are reported through `tracing` instead.
#[derive(Debug, Error)]
pub enum LogError {
    /// No level is registered under the given ordinal.
    #[error("unknown level: {0}")]
    UnknownLevel(u64),

    /// No level is registered under the given name.
    #[error("unknown level name: {0}")]
    UnknownLevelName(String),

    /// The ordinal is already bound to a name.
    #[error("level {0} is already registered")]
    DuplicateLevel(u64),

    /// The name is already bound to another ordinal.
    #[error("level name {0} is already registered")]
    DuplicateLevelName(String),

    /// A watched or loaded path does not exist.
    #[error("path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The configuration is structurally valid JSON but not usable.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The configured output kind has no sink in this crate.
    #[error("unsupported output: {0}")]
    UnsupportedOutput(String),

    /// The watcher was asked to start outside a tokio runtime.
    #[error("no tokio runtime available to run the config watcher")]
    NoRuntime,

    /// A deferred message producer failed.
    #[error("message producer failed: {0}")]
    Producer(String),
}

/// Result type alias for logger operations.
pub type Result<T> = std::result::Result<T, LogError>;
