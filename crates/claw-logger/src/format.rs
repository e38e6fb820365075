//! Record header formatting shared by every text sink.
//!
//! This module provides:
//! - [`HeaderFlags`] — Which header fields to emit
//! - [`Record`] — One dispatched log event as seen by a sink
//! - [`RecordFormatter`] — Renders `prefix, date, time, level, file:line, text`
//!
//! Sinks embed a [`RecordFormatter`] and only implement their own output
//! and lifecycle logic.

use std::fmt::{self, Write as _};
use std::ops::BitOr;
use std::panic::Location;
use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Utc};

use crate::level::{Level, LevelRegistry};

/// Header field selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HeaderFlags(u8);

impl HeaderFlags {
    /// No header fields besides prefix and level.
    pub const NONE: Self = Self(0);
    /// `YYYY/MM/DD`
    pub const DATE: Self = Self(1);
    /// `HH:MM:SS`
    pub const TIME: Self = Self(1 << 1);
    /// `.ffffff` after the time. Implies the time.
    pub const MICROSECONDS: Self = Self(1 << 2);
    /// Full source path of the call site.
    pub const LONG_FILE: Self = Self(1 << 3);
    /// Source file name of the call site. Overrides [`Self::LONG_FILE`].
    pub const SHORT_FILE: Self = Self(1 << 4);
    /// Render timestamps in UTC instead of local time.
    pub const UTC: Self = Self(1 << 5);
    /// Date and time.
    pub const STD: Self = Self(Self::DATE.0 | Self::TIME.0);

    /// Parses a `|`-joined list such as `date|time|shortfile`.
    ///
    /// Unknown names are ignored.
    #[must_use]
    pub fn parse(names: &str) -> Self {
        names.split('|')
            .map(str::trim)
            .filter_map(Self::from_name)
            .fold(Self::NONE, BitOr::bitor)
    }

    /// Maps a single flag name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "date" => Some(Self::DATE),
            "time" => Some(Self::TIME),
            "microseconds" => Some(Self::MICROSECONDS),
            "longfile" => Some(Self::LONG_FILE),
            "shortfile" => Some(Self::SHORT_FILE),
            "UTC" => Some(Self::UTC),
            "stdFlags" => Some(Self::STD),
            _ => None,
        }
    }

    /// Returns true if every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if any bit of `other` is set.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns true if a call-site location is part of the header.
    #[must_use]
    pub const fn wants_location(self) -> bool {
        self.intersects(Self(Self::LONG_FILE.0 | Self::SHORT_FILE.0))
    }
}

impl BitOr for HeaderFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One log event as offered to sinks.
///
/// The timestamp is taken once by the dispatcher so every sink sees the
/// same instant.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    /// When the event was dispatched.
    pub timestamp: DateTime<Local>,
    /// Severity.
    pub level: Level,
    /// Fully formatted message text.
    pub text: &'a str,
    /// Call site, when known.
    pub location: Option<&'static Location<'static>>,
}

impl<'a> Record<'a> {
    /// Creates a record with no call site.
    #[must_use]
    pub const fn new(timestamp: DateTime<Local>, level: Level, text: &'a str) -> Self {
        Self {
            timestamp,
            level,
            text,
            location: None,
        }
    }

    /// Attaches a call site.
    #[must_use]
    pub const fn with_location(mut self, location: &'static Location<'static>) -> Self {
        self.location = Some(location);
        self
    }
}

/// Header renderer embedded by each text sink.
#[derive(Debug, Clone)]
pub struct RecordFormatter {
    prefix: String,
    flags: HeaderFlags,
    level: Level,
    registry: Arc<LevelRegistry>,
}

impl RecordFormatter {
    /// Creates a formatter for a sink configured at `level`.
    #[must_use]
    pub fn new(registry: Arc<LevelRegistry>, level: Level) -> Self {
        Self {
            prefix: String::new(),
            flags: HeaderFlags::STD,
            level,
            registry,
        }
    }

    /// Sets the literal line prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets the header flags.
    #[must_use]
    pub const fn with_flags(mut self, flags: HeaderFlags) -> Self {
        self.flags = flags;
        self
    }

    /// The sink's configured level.
    #[must_use]
    pub const fn level(&self) -> Level {
        self.level
    }

    /// The header flags.
    #[must_use]
    pub const fn flags(&self) -> HeaderFlags {
        self.flags
    }

    /// The line prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns true if this sink's level lets `level` through.
    #[must_use]
    pub const fn admits(&self, level: Level) -> bool {
        level.is_enabled_for(self.level)
    }

    /// Renders the full newline-terminated line into `buf`.
    pub fn format_into(&self, record: &Record<'_>, buf: &mut String) {
        self.write_header(record, buf);
        buf.push_str(record.text);
        if !record.text.ends_with('\n') {
            buf.push('\n');
        }
    }

    /// Renders the full newline-terminated line.
    #[must_use]
    pub fn format(&self, record: &Record<'_>) -> String {
        let mut buf = String::with_capacity(self.prefix.len() + record.text.len() + 48);
        self.format_into(record, &mut buf);
        buf
    }

    fn write_header(&self, record: &Record<'_>, buf: &mut String) {
        buf.push_str(&self.prefix);

        let time_flags = HeaderFlags::DATE | HeaderFlags::TIME | HeaderFlags::MICROSECONDS;
        if self.flags.intersects(time_flags) {
            if self.flags.contains(HeaderFlags::UTC) {
                self.write_timestamp(&record.timestamp.with_timezone(&Utc), buf);
            } else {
                self.write_timestamp(&record.timestamp, buf);
            }
        }

        buf.push_str(&self.registry.aligned_name(record.level, self.level));
        buf.push(' ');

        if self.flags.wants_location() {
            let (file, line) = record
                .location
                .map_or(("???", 0), |loc| (loc.file(), loc.line()));
            let file = if self.flags.contains(HeaderFlags::SHORT_FILE) {
                short_file(file)
            } else {
                file
            };
            let _ = write!(buf, "{file}:{line}: ");
        }
    }

    fn write_timestamp<Tz>(&self, t: &DateTime<Tz>, buf: &mut String)
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        if self.flags.contains(HeaderFlags::DATE) {
            let _ = write!(buf, "{} ", t.format("%Y/%m/%d"));
        }
        if self
            .flags
            .intersects(HeaderFlags::TIME | HeaderFlags::MICROSECONDS)
        {
            let _ = write!(buf, "{}", t.format("%H:%M:%S"));
            if self.flags.contains(HeaderFlags::MICROSECONDS) {
                let _ = write!(buf, "{}", t.format("%.6f"));
            }
            buf.push(' ');
        }
    }
}

fn short_file(file: &str) -> &str {
    file.rsplit(['/', '\\']).next().unwrap_or(file)
}
