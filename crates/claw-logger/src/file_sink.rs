//! Rotating file sink.
//!
//! This module provides:
//! - [`RotatingFileSink`] — Appends formatted records to a file and rotates it
//!   by size, line count, or calendar day
//! - [`FileSinkConfig`] — Rotation policy
//!
//! Backups are named `<file>.<index>`, index 1 being the newest, with the
//! index zero-padded to the digit count of `max_backups` so lexical and
//! numeric order agree. Daily rotation moves the active file and all of its
//! backups into `<dir>/<YYYYMMDD>/` named after the day that just ended.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate, Utc};
use parking_lot::Mutex;
use tracing::{error, warn};

use crate::error::Result;
use crate::format::{HeaderFlags, Record, RecordFormatter};
use crate::level::Level;
use crate::traits::Sink;

/// Rotation policy for a [`RotatingFileSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSinkConfig {
    /// Active log file.
    pub path: PathBuf,
    /// Rotate once the active file grows past this many bytes. 0 disables.
    pub max_bytes: u64,
    /// Rotate once the active file holds this many lines. 0 disables.
    pub max_lines: u64,
    /// Number of numbered backups to keep.
    pub max_backups: usize,
    /// Rotate when the calendar day changes.
    pub daily: bool,
}

/// Backups kept when no count is configured.
pub const DEFAULT_MAX_BACKUPS: usize = 7;

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("logs/claw.log"),
            max_bytes: 0,
            max_lines: 0,
            max_backups: DEFAULT_MAX_BACKUPS,
            daily: false,
        }
    }
}

impl FileSinkConfig {
    /// Creates a config for the given file with rotation disabled.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Sets the size threshold.
    #[must_use]
    pub const fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Sets the line threshold.
    #[must_use]
    pub const fn with_max_lines(mut self, max_lines: u64) -> Self {
        self.max_lines = max_lines;
        self
    }

    /// Sets how many backups are kept.
    #[must_use]
    pub const fn with_max_backups(mut self, max_backups: usize) -> Self {
        self.max_backups = max_backups;
        self
    }

    /// Enables or disables daily rotation.
    #[must_use]
    pub const fn with_daily(mut self, daily: bool) -> Self {
        self.daily = daily;
        self
    }

    /// Width of the zero-padded backup index.
    #[must_use]
    pub fn index_width(&self) -> usize {
        self.max_backups.max(1).to_string().len()
    }
}

/// Mutable state guarded by the sink's lock.
struct RotationState {
    /// Active handle. `None` between a failed reopen and the next write.
    file: Option<File>,
    /// Lines in the active file.
    lines: u64,
    /// Bytes in the active file.
    bytes: u64,
    /// Numbered backups currently on disk.
    backups: usize,
    /// Day of the last rotation, or of the first write to a fresh file.
    last_day: Option<NaiveDate>,
    /// Set when a rotation fails; all further writes are dropped.
    stopped: bool,
    closed: bool,
}

/// A file sink with size, line and daily rotation.
///
/// One lock covers formatting output, counter updates and rotation, so a
/// concurrent writer sees either the file before rotation or the fresh one.
pub struct RotatingFileSink {
    config: FileSinkConfig,
    formatter: RecordFormatter,
    dir: PathBuf,
    file_name: String,
    state: Mutex<RotationState>,
}

impl RotatingFileSink {
    /// Opens (or creates) the active file and recovers counters from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created, the file
    /// cannot be opened, or the path has no file name.
    pub fn new(config: FileSinkConfig, formatter: RecordFormatter) -> Result<Self> {
        let dir = match config.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let file_name = config
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("log path has no file name: {}", config.path.display()),
                )
            })?;

        let file = open_append(&config.path)?;
        let metadata = file.metadata()?;
        let bytes = metadata.len();
        let lines = if bytes > 0 { count_lines(&config.path)? } else { 0 };
        let last_day = if bytes > 0 {
            metadata
                .modified()
                .ok()
                .map(|m| DateTime::<Local>::from(m).date_naive())
        } else {
            None
        };
        let backups = scan_backups(&dir, &file_name, config.max_backups);

        Ok(Self {
            config,
            formatter,
            dir,
            file_name,
            state: Mutex::new(RotationState {
                file: Some(file),
                lines,
                bytes,
                backups,
                last_day,
                stopped: false,
                closed: false,
            }),
        })
    }

    /// The rotation policy.
    #[must_use]
    pub const fn config(&self) -> &FileSinkConfig {
        &self.config
    }

    /// Path of backup `index` (1 is the newest).
    #[must_use]
    pub fn backup_path(&self, index: usize) -> PathBuf {
        let width = self.config.index_width();
        self.dir.join(format!("{}.{index:0width$}", self.file_name))
    }

    /// Lines written to the active file.
    #[must_use]
    pub fn line_count(&self) -> u64 {
        self.state.lock().lines
    }

    /// Bytes written to the active file.
    #[must_use]
    pub fn byte_count(&self) -> u64 {
        self.state.lock().bytes
    }

    /// Numbered backups currently on disk.
    #[must_use]
    pub fn backup_count(&self) -> usize {
        self.state.lock().backups
    }

    /// Returns true once a rotation failure has disabled the sink.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    fn record_day(&self, timestamp: DateTime<Local>) -> NaiveDate {
        if self.formatter.flags().contains(HeaderFlags::UTC) {
            timestamp.with_timezone(&Utc).date_naive()
        } else {
            timestamp.date_naive()
        }
    }

    fn exceeds_limits(&self, state: &RotationState) -> bool {
        (self.config.max_lines > 0 && state.lines >= self.config.max_lines)
            || (self.config.max_bytes > 0 && state.bytes > self.config.max_bytes)
    }

    fn rotate_daily_locked(&self, state: &mut RotationState, day: NaiveDate) {
        let Some(previous) = state.last_day else {
            state.last_day = Some(day);
            return;
        };
        if previous == day {
            return;
        }

        state.file = None;
        let target = self.dir.join(previous.format("%Y%m%d").to_string());
        if let Err(e) = fs::create_dir_all(&target) {
            warn!(path = %target.display(), error = %e, "failed to create daily backup directory");
        } else {
            self.move_family_into(&target);
        }

        state.backups = 0;
        state.lines = 0;
        state.bytes = 0;
        state.last_day = Some(day);
        match open_append(&self.config.path) {
            Ok(file) => {
                let len = file.metadata().map(|m| m.len()).unwrap_or(0);
                if len > 0 {
                    // The move failed; keep counting against what is there.
                    state.bytes = len;
                    state.lines = count_lines(&self.config.path).unwrap_or(0);
                    state.backups =
                        scan_backups(&self.dir, &self.file_name, self.config.max_backups);
                }
                state.file = Some(file);
            }
            Err(e) => {
                warn!(path = %self.config.path.display(), error = %e, "failed to reopen log file after daily rotation");
            }
        }
    }

    fn move_family_into(&self, target: &Path) {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.dir.display(), error = %e, "failed to scan log directory");
                return;
            }
        };

        for entry in entries.filter_map(std::result::Result::ok) {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with(&self.file_name) {
                continue;
            }
            if entry.file_type().is_ok_and(|t| t.is_dir()) {
                continue;
            }
            let to = target.join(name.as_ref());
            if let Err(e) = fs::rename(entry.path(), &to) {
                warn!(
                    from = %entry.path().display(),
                    to = %to.display(),
                    error = %e,
                    "failed to move log file into daily backup directory"
                );
            }
        }
    }

    /// Shifts the backup chain and starts a fresh active file.
    ///
    /// Any filesystem failure stops the sink.
    fn rotate_locked(&self, state: &mut RotationState) {
        state.file = None;

        if let Err(e) = self.shift_chain(state) {
            error!(
                path = %self.config.path.display(),
                error = %e,
                "log rotation failed, sink stopped"
            );
            state.stopped = true;
            return;
        }

        match open_append(&self.config.path) {
            Ok(file) => {
                state.file = Some(file);
                state.lines = 0;
                state.bytes = 0;
            }
            Err(e) => {
                error!(
                    path = %self.config.path.display(),
                    error = %e,
                    "failed to open fresh log file, sink stopped"
                );
                state.stopped = true;
            }
        }
    }

    fn shift_chain(&self, state: &mut RotationState) -> io::Result<()> {
        let max = self.config.max_backups;
        if max == 0 {
            return remove_if_exists(&self.config.path);
        }

        if state.backups >= max {
            remove_if_exists(&self.backup_path(max))?;
            state.backups = max - 1;
        }

        // Highest index first so nothing is overwritten before it moves.
        for index in (1..=state.backups).rev() {
            rename_if_exists(&self.backup_path(index), &self.backup_path(index + 1))?;
        }
        fs::rename(&self.config.path, self.backup_path(1))?;
        state.backups += 1;
        Ok(())
    }
}

impl Sink for RotatingFileSink {
    fn name(&self) -> &str {
        &self.file_name
    }

    fn level(&self) -> Level {
        self.formatter.level()
    }

    fn write(&self, record: &Record<'_>) -> Result<usize> {
        if !self.formatter.admits(record.level) {
            return Ok(0);
        }
        let line = self.formatter.format(record);

        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.stopped || state.closed {
            return Ok(0);
        }

        if self.config.daily {
            self.rotate_daily_locked(state, self.record_day(record.timestamp));
        }
        if state.file.is_none() {
            state.file = Some(open_append(&self.config.path)?);
        }
        let Some(file) = state.file.as_mut() else {
            return Ok(0);
        };
        file.write_all(line.as_bytes())?;

        state.lines += line.bytes().filter(|b| *b == b'\n').count() as u64;
        state.bytes += line.len() as u64;
        if self.exceeds_limits(state) {
            self.rotate_locked(state);
        }
        Ok(line.len())
    }

    fn flush(&self) {
        if let Some(file) = self.state.lock().file.as_mut() {
            if let Err(e) = file.flush() {
                warn!(path = %self.config.path.display(), error = %e, "failed to flush log file");
            }
        }
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.file = None;
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn count_lines(path: &Path) -> io::Result<u64> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut count = 0u64;
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            break;
        }
        count += buf.iter().filter(|b| **b == b'\n').count() as u64;
        let len = buf.len();
        reader.consume(len);
    }
    Ok(count)
}

/// Returns the highest backup index present, capped at `max_backups`.
fn scan_backups(dir: &Path, file_name: &str, max_backups: usize) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    let prefix = format!("{file_name}.");
    entries
        .filter_map(std::result::Result::ok)
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            let suffix = name.strip_prefix(&prefix)?;
            if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            suffix.parse::<usize>().ok()
        })
        .filter(|index| (1..=max_backups).contains(index))
        .max()
        .unwrap_or(0)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn rename_if_exists(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
