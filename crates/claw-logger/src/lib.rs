//! # claw-logger
//!
//! Multi-sink structured logger for Clawbernetes services.
//!
//! This crate provides:
//!
//! - [`Level`] / [`LevelRegistry`] — Ordinal severities with extensible names
//! - [`Sink`] — The output contract, with before/after hooks
//! - [`ConsoleSink`] / [`WriterSink`] — Stdout, stderr or any writer
//! - [`RotatingFileSink`] — Size, line-count and daily rotation with a
//!   bounded backup chain
//! - [`SocketSink`] — TCP/UDP shipping with an optional JSON envelope
//! - [`Logger`] — Fan-out dispatcher with lazy messages and FATAL/PANIC
//!   escalation
//! - [`LoggerConfig`] — JSON configuration and sink construction
//! - [`ConfigWatcher`] — Polling file watcher for live reload
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use claw_logger::{info, Level, LevelRegistry, Logger, Message, RecordFormatter, WriterSink};
//!
//! let registry = LevelRegistry::shared();
//! let sink = Arc::new(WriterSink::new(
//!     "memory",
//!     RecordFormatter::new(Arc::clone(&registry), Level::INFO),
//!     Vec::new(),
//! ));
//! let logger = Logger::with_sinks(registry, vec![sink]);
//!
//! info!(logger, "started {}", "ok");
//! logger.debug(Message::lazy(|| Ok(String::from("never built"))));
//! assert!(!logger.is_debug_enabled());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod console;
pub mod error;
pub mod file_sink;
pub mod format;
pub mod level;
pub mod logger;
mod macros;
pub mod socket;
pub mod traits;
pub mod watcher;

// Re-export main types
pub use config::{build_sink, LoggerConfig, Output, SinkConfig, DEFAULT_CONFIG_PATHS};
pub use console::{ConsoleOutput, ConsoleSink, WriterSink};
pub use error::{LogError, Result};
pub use file_sink::{DEFAULT_MAX_BACKUPS, FileSinkConfig, RotatingFileSink};
pub use format::{HeaderFlags, Record, RecordFormatter};
pub use level::{Level, LevelRegistry};
pub use logger::{BoxError, Logger, Message, Outcome, Producer};
pub use socket::{Codec, Network, SocketSink, SocketSinkConfig};
pub use traits::Sink;
pub use watcher::{ConfigWatcher, DEFAULT_POLL_INTERVAL};
