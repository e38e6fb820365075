//! Severity levels and the registry that names them.
//!
//! This module provides:
//! - [`Level`] — An ordinal severity where smaller values are more urgent
//! - [`LevelRegistry`] — Name bindings for built-in and custom levels, with
//!   display names padded to a common width
//!
//! A level `L` is enabled under a threshold `T` iff `L <= T`. Raising the
//! threshold therefore admits more, less urgent, records.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::{LogError, Result};

/// Severity ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Level(pub u64);

impl Level {
    /// Disables all output.
    pub const OFF: Self = Self(0);
    /// Unrecoverable for the calling thread.
    pub const PANIC: Self = Self(100);
    /// Unrecoverable for the process.
    pub const FATAL: Self = Self(200);
    /// Error conditions.
    pub const ERROR: Self = Self(300);
    /// Warning conditions.
    pub const WARN: Self = Self(400);
    /// General information.
    pub const INFO: Self = Self(500);
    /// Debugging information.
    pub const DEBUG: Self = Self(600);
    /// Most verbose.
    pub const TRACE: Self = Self(700);
    /// Enables all output.
    pub const ALL: Self = Self(u64::MAX);

    /// Built-in levels in ordinal order.
    pub const BUILTIN: [(Self, &'static str); 9] = [
        (Self::OFF, "OFF"),
        (Self::PANIC, "PANIC"),
        (Self::FATAL, "FATAL"),
        (Self::ERROR, "ERROR"),
        (Self::WARN, "WARN"),
        (Self::INFO, "INFO"),
        (Self::DEBUG, "DEBUG"),
        (Self::TRACE, "TRACE"),
        (Self::ALL, "ALL"),
    ];

    /// Returns the raw ordinal.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns true if a record at this level passes a sink configured at `threshold`.
    #[must_use]
    pub const fn is_enabled_for(self, threshold: Self) -> bool {
        self.0 <= threshold.0
    }

    /// Returns the built-in name, if this is a built-in level.
    #[must_use]
    pub fn builtin_name(self) -> Option<&'static str> {
        Self::BUILTIN
            .iter()
            .find(|(level, _)| *level == self)
            .map(|(_, name)| *name)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.builtin_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.0),
        }
    }
}

impl From<u64> for Level {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Name bindings for levels.
///
/// Registration is expected to finish during initialisation, before
/// concurrent logging starts. The registry is still internally locked so it
/// can be shared behind an [`Arc`], but callers should not rely on custom
/// levels registered mid-flight showing up consistently in every sink.
#[derive(Debug)]
pub struct LevelRegistry {
    names: RwLock<BTreeMap<Level, String>>,
    /// Alignment width per threshold, cleared on every registration.
    widths: Mutex<HashMap<Level, usize>>,
}

impl Default for LevelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LevelRegistry {
    /// Creates a registry holding the built-in levels.
    #[must_use]
    pub fn new() -> Self {
        let names = Level::BUILTIN
            .iter()
            .map(|(level, name)| (*level, (*name).to_string()))
            .collect();
        Self {
            names: RwLock::new(names),
            widths: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a shareable registry holding the built-in levels.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Binds `name` to `ordinal`.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::DuplicateLevel`] if the ordinal is already named, or
    /// [`LogError::DuplicateLevelName`] if the name is taken. The registry is
    /// left untouched on failure.
    pub fn register(&self, name: impl Into<String>, ordinal: u64) -> Result<Level> {
        let name = name.into();
        let level = Level(ordinal);

        let mut names = self.names.write();
        if names.contains_key(&level) {
            return Err(LogError::DuplicateLevel(ordinal));
        }
        if names.values().any(|existing| *existing == name) {
            return Err(LogError::DuplicateLevelName(name));
        }
        names.insert(level, name);
        self.widths.lock().clear();
        Ok(level)
    }

    /// Returns true if `level` has a name.
    #[must_use]
    pub fn contains(&self, level: Level) -> bool {
        self.names.read().contains_key(&level)
    }

    /// Returns the name bound to `level`.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::UnknownLevel`] if the level is not registered.
    pub fn name_of(&self, level: Level) -> Result<String> {
        self.names
            .read()
            .get(&level)
            .cloned()
            .ok_or(LogError::UnknownLevel(level.0))
    }

    /// Looks a level up by name.
    ///
    /// Exact matches win; otherwise the first ASCII case-insensitive match is used.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::UnknownLevelName`] if no level carries that name.
    pub fn by_name(&self, name: &str) -> Result<Level> {
        let names = self.names.read();
        names
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .or_else(|| names.iter().find(|(_, n)| n.eq_ignore_ascii_case(name)))
            .map(|(level, _)| *level)
            .ok_or_else(|| LogError::UnknownLevelName(name.to_string()))
    }

    /// Returns the name of `level` right-padded to the widest name among
    /// levels at or below `threshold`.
    ///
    /// Unregistered levels render as their ordinal.
    #[must_use]
    pub fn aligned_name(&self, level: Level, threshold: Level) -> String {
        let names = self.names.read();
        let width = *self
            .widths
            .lock()
            .entry(threshold)
            .or_insert_with(|| {
                names
                    .range(..=threshold)
                    .map(|(_, n)| n.chars().count())
                    .max()
                    .unwrap_or(0)
            });

        match names.get(&level) {
            Some(name) => format!("{name:<width$}"),
            None => format!("{:<width$}", level.0),
        }
    }

    /// Returns all registered levels in ordinal order.
    #[must_use]
    pub fn levels(&self) -> Vec<(Level, String)> {
        self.names
            .read()
            .iter()
            .map(|(level, name)| (*level, name.clone()))
            .collect()
    }
}
