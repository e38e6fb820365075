//! Declarative logger configuration.
//!
//! This module provides:
//! - [`LoggerConfig`] — Top-level settings plus one [`SinkConfig`] per output
//! - [`SinkConfig`] — One sink, in the JSON shape the config files use
//! - [`build_sink`] — Turns a [`SinkConfig`] into a live [`Sink`]
//!
//! Example file:
//!
//! ```json
//! {
//!   "level": "INFO",
//!   "flag": "date|time|shortfile",
//!   "Loggers": [
//!     { "output": "stdout" },
//!     { "output": "file", "filename": "logs/app.log", "max_lines": 100000, "max_count": 9, "daily": true }
//!   ]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::console::ConsoleSink;
use crate::error::{LogError, Result};
use crate::file_sink::{DEFAULT_MAX_BACKUPS, FileSinkConfig, RotatingFileSink};
use crate::format::{HeaderFlags, RecordFormatter};
use crate::level::{Level, LevelRegistry};
use crate::socket::{Codec, Network, SocketSink, SocketSinkConfig};
use crate::traits::Sink;

/// Locations probed by [`LoggerConfig::discover`], in order.
pub const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "./claw-logger.json",
    "conf/claw-logger.json",
    "config/claw-logger.json",
];

/// Where a sink sends its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Output {
    /// Process standard output.
    #[default]
    Stdout,
    /// Process standard error.
    Stderr,
    /// Rotating file.
    File,
    /// Redis list; handled by external extensions.
    Redis,
    /// TCP or UDP peer.
    Socket,
}

/// One sink's settings.
///
/// Empty `prefix`, `level` and `flag` inherit the top-level values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Skip this sink entirely.
    pub disabled: bool,
    /// Line prefix.
    pub prefix: String,
    /// Level name, e.g. `INFO`.
    pub level: String,
    /// Header flags, e.g. `date|time|shortfile`.
    pub flag: String,
    /// Destination kind.
    pub output: Output,
    /// Active file for [`Output::File`].
    pub filename: String,
    /// Size rotation threshold in bytes. 0 disables.
    pub maxsize: u64,
    /// Line rotation threshold. 0 disables.
    pub max_lines: u64,
    /// Backups to keep. Defaults to [`DEFAULT_MAX_BACKUPS`].
    pub max_count: usize,
    /// Rotate on calendar day change.
    pub daily: bool,
    /// Peer address for network and queue outputs.
    pub address: String,
    /// Redis database index.
    pub db: i64,
    /// Redis password.
    pub password: String,
    /// Redis structure, e.g. `list`.
    pub redis_type: String,
    /// Redis key.
    pub redis_key: String,
    /// Transport for [`Output::Socket`].
    pub network: Network,
    /// Payload encoding for network and queue outputs.
    pub codec: Codec,
    /// JSON key that carries the line.
    pub json_key: String,
    /// Extra JSON fields, as a JSON object string.
    pub json_ext: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            prefix: String::new(),
            level: String::new(),
            flag: String::new(),
            output: Output::default(),
            filename: String::new(),
            maxsize: 0,
            max_lines: 0,
            max_count: DEFAULT_MAX_BACKUPS,
            daily: false,
            address: String::new(),
            db: 0,
            password: String::new(),
            redis_type: String::new(),
            redis_key: String::new(),
            network: Network::default(),
            codec: Codec::default(),
            json_key: String::new(),
            json_ext: String::new(),
        }
    }
}

impl SinkConfig {
    /// A stdout sink inheriting everything.
    #[must_use]
    pub fn stdout() -> Self {
        Self::default()
    }

    /// A file sink inheriting everything, with no rotation.
    #[must_use]
    pub fn file(filename: impl Into<String>) -> Self {
        Self {
            output: Output::File,
            filename: filename.into(),
            ..Self::default()
        }
    }
}

/// Top-level logger settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Default line prefix.
    pub prefix: String,
    /// Default level name.
    pub level: String,
    /// Default header flags, `|`-joined.
    pub flag: String,
    /// One entry per sink, in fan-out order.
    #[serde(rename = "Loggers", alias = "loggers")]
    pub loggers: Vec<SinkConfig>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            level: "DEBUG".to_string(),
            flag: "date|time|shortfile".to_string(),
            loggers: vec![SinkConfig::stdout()],
        }
    }
}

impl LoggerConfig {
    /// Reads and parses a config file.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::PathNotFound`] if the file is missing, or an I/O
    /// or serialization error if it cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LogError::PathNotFound(path.to_path_buf()));
        }
        let data = fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Parses a config from JSON text.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the text is not a valid config.
    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// Loads `path`, falling back to defaults on any error.
    #[must_use]
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load logger config, using defaults");
                Self::default()
            }
        }
    }

    /// Loads the first existing file among [`DEFAULT_CONFIG_PATHS`].
    ///
    /// Returns the path used, if any, alongside the config.
    #[must_use]
    pub fn discover() -> (Option<PathBuf>, Self) {
        for candidate in DEFAULT_CONFIG_PATHS {
            let path = PathBuf::from(candidate);
            if path.exists() {
                debug!(path = %path.display(), "found logger config");
                let config = Self::load_or_default(&path);
                return (Some(path), config);
            }
        }
        (None, Self::default())
    }

    /// Resolves the effective level of a sink.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::UnknownLevelName`] for a misspelt level.
    pub fn sink_level(&self, sink: &SinkConfig, registry: &LevelRegistry) -> Result<Level> {
        let name = if sink.level.is_empty() { &self.level } else { &sink.level };
        registry.by_name(name)
    }

    /// Builds the header formatter for a sink.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::UnknownLevelName`] for a misspelt level.
    pub fn formatter(
        &self,
        sink: &SinkConfig,
        registry: Arc<LevelRegistry>,
    ) -> Result<RecordFormatter> {
        let level = self.sink_level(sink, &registry)?;
        let prefix = if sink.prefix.is_empty() { &self.prefix } else { &sink.prefix };
        let flag = if sink.flag.is_empty() { &self.flag } else { &sink.flag };
        Ok(RecordFormatter::new(registry, level)
            .with_prefix(prefix.clone())
            .with_flags(HeaderFlags::parse(flag)))
    }
}

/// Builds the sink described by `sink`.
///
/// Returns `Ok(None)` for a disabled sink.
///
/// # Errors
///
/// Returns an error if the level is unknown, a required field is missing,
/// the output kind is not provided by this crate, or the sink's resource
/// cannot be opened.
pub fn build_sink(
    sink: &SinkConfig,
    config: &LoggerConfig,
    registry: Arc<LevelRegistry>,
) -> Result<Option<Box<dyn Sink>>> {
    if sink.disabled {
        return Ok(None);
    }
    let formatter = config.formatter(sink, registry)?;

    let built: Box<dyn Sink> = match sink.output {
        Output::Stdout => Box::new(ConsoleSink::stdout(formatter)),
        Output::Stderr => Box::new(ConsoleSink::stderr(formatter)),
        Output::File => {
            if sink.filename.is_empty() {
                return Err(LogError::InvalidConfig(
                    "file output requires a filename".to_string(),
                ));
            }
            let file_config = FileSinkConfig::new(&sink.filename)
                .with_max_bytes(sink.maxsize)
                .with_max_lines(sink.max_lines)
                .with_max_backups(sink.max_count)
                .with_daily(sink.daily);
            Box::new(RotatingFileSink::new(file_config, formatter)?)
        }
        Output::Socket => {
            if sink.address.is_empty() {
                return Err(LogError::InvalidConfig(
                    "socket output requires an address".to_string(),
                ));
            }
            let mut socket_config = SocketSinkConfig::new(&sink.address).with_network(sink.network);
            if sink.codec == Codec::Json {
                let key = if sink.json_key.is_empty() {
                    "message"
                } else {
                    sink.json_key.as_str()
                };
                socket_config = socket_config.with_json(key, sink.json_ext.clone());
            }
            Box::new(SocketSink::connect(socket_config, formatter)?)
        }
        Output::Redis => return Err(LogError::UnsupportedOutput("redis".to_string())),
    };
    Ok(Some(built))
}
