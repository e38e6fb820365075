//! Writer-backed sinks.
//!
//! This module provides:
//! - [`WriterSink`] — Formats records onto any [`Write`] implementor
//! - [`ConsoleSink`] — A [`WriterSink`] over stdout or stderr

use std::io::{self, Write};

use parking_lot::Mutex;

use crate::error::Result;
use crate::format::{Record, RecordFormatter};
use crate::level::Level;
use crate::traits::Sink;

/// A sink that writes formatted lines to a [`Write`] implementor.
///
/// Each record is formatted outside the lock and emitted with a single
/// `write_all` under it, so lines from concurrent callers never interleave.
pub struct WriterSink<W: Write + Send> {
    name: String,
    formatter: RecordFormatter,
    out: Mutex<Option<W>>,
}

impl<W: Write + Send> WriterSink<W> {
    /// Creates a sink writing to `out`.
    pub fn new(name: impl Into<String>, formatter: RecordFormatter, out: W) -> Self {
        Self {
            name: name.into(),
            formatter,
            out: Mutex::new(Some(out)),
        }
    }

    /// The embedded formatter.
    #[must_use]
    pub const fn formatter(&self) -> &RecordFormatter {
        &self.formatter
    }

    /// Runs `f` against the writer, or returns `None` once closed.
    pub fn with_output<R>(&self, f: impl FnOnce(&W) -> R) -> Option<R> {
        self.out.lock().as_ref().map(f)
    }

    /// Returns true once [`Sink::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.out.lock().is_none()
    }
}

impl<W: Write + Send> Sink for WriterSink<W> {
    fn name(&self) -> &str {
        &self.name
    }

    fn level(&self) -> Level {
        self.formatter.level()
    }

    fn write(&self, record: &Record<'_>) -> Result<usize> {
        if !self.formatter.admits(record.level) {
            return Ok(0);
        }
        let line = self.formatter.format(record);

        let mut out = self.out.lock();
        let Some(writer) = out.as_mut() else {
            return Ok(0);
        };
        writer.write_all(line.as_bytes())?;
        Ok(line.len())
    }

    fn flush(&self) {
        if let Some(writer) = self.out.lock().as_mut() {
            if let Err(e) = writer.flush() {
                tracing::warn!(sink = %self.name, error = %e, "failed to flush sink");
            }
        }
    }

    fn close(&self) {
        if let Some(mut writer) = self.out.lock().take() {
            if let Err(e) = writer.flush() {
                tracing::warn!(sink = %self.name, error = %e, "failed to flush sink on close");
            }
        }
    }
}

/// Standard stream a [`ConsoleSink`] writes to.
pub enum ConsoleOutput {
    /// Process standard output.
    Stdout(io::Stdout),
    /// Process standard error.
    Stderr(io::Stderr),
}

impl Write for ConsoleOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stdout(out) => out.write(buf),
            Self::Stderr(err) => err.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Self::Stdout(out) => out.write_all(buf),
            Self::Stderr(err) => err.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stdout(out) => out.flush(),
            Self::Stderr(err) => err.flush(),
        }
    }
}

/// Console sink.
pub type ConsoleSink = WriterSink<ConsoleOutput>;

impl WriterSink<ConsoleOutput> {
    /// Creates a sink on standard output.
    #[must_use]
    pub fn stdout(formatter: RecordFormatter) -> Self {
        Self::new("stdout", formatter, ConsoleOutput::Stdout(io::stdout()))
    }

    /// Creates a sink on standard error.
    #[must_use]
    pub fn stderr(formatter: RecordFormatter) -> Self {
        Self::new("stderr", formatter, ConsoleOutput::Stderr(io::stderr()))
    }
}
