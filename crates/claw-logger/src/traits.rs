//! The sink capability contract.
//!
//! This module provides the [`Sink`] trait, implemented by every output
//! destination the [`Logger`](crate::Logger) fans records out to.

use chrono::{DateTime, Local};

use crate::error::Result;
use crate::format::Record;
use crate::level::Level;

/// An output destination with lifecycle hooks around each record.
///
/// For every dispatched record the logger calls [`before`](Sink::before),
/// then [`write`](Sink::write), then [`after`](Sink::after) with the byte
/// count `write` reported. A failed `write` skips `after`.
///
/// Implementors own their locking: `write` may be called from many threads
/// at once.
pub trait Sink: Send + Sync {
    /// Short human-readable identifier used in diagnostics.
    fn name(&self) -> &str;

    /// The sink's configured level.
    fn level(&self) -> Level;

    /// Returns true if this sink would accept a record at `level`.
    fn admits(&self, level: Level) -> bool {
        level.is_enabled_for(self.level())
    }

    /// Called before the record is written.
    fn before(&self, _timestamp: DateTime<Local>) {}

    /// Writes one record, returning the number of bytes emitted.
    ///
    /// Records above the sink's level are dropped with `Ok(0)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying output fails. The logger reports
    /// it and carries on with the remaining sinks.
    fn write(&self, record: &Record<'_>) -> Result<usize>;

    /// Called after a successful write.
    fn after(&self, _timestamp: DateTime<Local>, _written: usize) {}

    /// Flushes buffered output.
    fn flush(&self) {}

    /// Releases the sink's resources. Idempotent.
    fn close(&self) {}
}
