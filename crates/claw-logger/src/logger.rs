//! The dispatcher that fans each log call out to every sink.
//!
//! This module provides:
//! - [`Logger`] — Owns the sink list, gates by level, formats lazily, and
//!   reports escalation
//! - [`Message`] — What the caller hands over: text, format arguments, a
//!   displayable value, or a deferred producer
//! - [`Outcome`] — What the caller should do next

use std::borrow::Cow;
use std::fmt;
use std::panic::Location;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Local;
use parking_lot::RwLock;
use tracing::{debug, error, warn};

use crate::config::{build_sink, LoggerConfig};
use crate::error::{LogError, Result};
use crate::format::Record;
use crate::level::{Level, LevelRegistry};
use crate::traits::Sink;
use crate::watcher::ConfigWatcher;

/// Error type a deferred producer may fail with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A deferred message producer.
pub type Producer<'a> = Box<dyn FnOnce() -> std::result::Result<String, BoxError> + 'a>;

/// The message part of a log call.
pub enum Message<'a> {
    /// Literal text.
    Text(Cow<'a, str>),
    /// Pre-bound format arguments, usually from [`format_args!`].
    Args(fmt::Arguments<'a>),
    /// Any displayable value.
    Display(&'a dyn fmt::Display),
    /// Built only if some sink would accept the record.
    Lazy(Producer<'a>),
}

impl<'a> Message<'a> {
    /// Wraps a producer that runs only when the record would be written.
    pub fn lazy<F>(producer: F) -> Self
    where
        F: FnOnce() -> std::result::Result<String, BoxError> + 'a,
    {
        Self::Lazy(Box::new(producer))
    }

    /// Wraps a displayable value.
    pub fn display(value: &'a dyn fmt::Display) -> Self {
        Self::Display(value)
    }
}

impl<'a> From<&'a str> for Message<'a> {
    fn from(text: &'a str) -> Self {
        Self::Text(Cow::Borrowed(text))
    }
}

impl From<String> for Message<'_> {
    fn from(text: String) -> Self {
        Self::Text(Cow::Owned(text))
    }
}

impl<'a> From<fmt::Arguments<'a>> for Message<'a> {
    fn from(args: fmt::Arguments<'a>) -> Self {
        Self::Args(args)
    }
}

impl fmt::Debug for Message<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Args(args) => f.debug_tuple("Args").field(args).finish(),
            Self::Display(value) => f.debug_tuple("Display").field(&value.to_string()).finish(),
            Self::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// Result of a log call.
///
/// The logger never exits or unwinds by itself; FATAL and PANIC records are
/// reported back so the host decides how to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The logger was closed or the override level excluded the record.
    Ignored,
    /// The record was offered to the sinks.
    Accepted,
    /// A FATAL record was offered; the process should exit.
    Terminate,
    /// A PANIC record was offered; the caller should unwind with this text.
    Abort(String),
}

impl Outcome {
    /// Returns true for [`Outcome::Terminate`] and [`Outcome::Abort`].
    #[must_use]
    pub const fn is_escalation(&self) -> bool {
        matches!(self, Self::Terminate | Self::Abort(_))
    }

    /// Exits with status 1 on `Terminate` and panics with the record text on
    /// `Abort`. Other outcomes return normally.
    #[allow(clippy::panic)]
    pub fn escalate(self) {
        match self {
            Self::Terminate => std::process::exit(1),
            Self::Abort(text) => panic!("{text}"),
            Self::Ignored | Self::Accepted => {}
        }
    }
}

/// Fans log calls out to an ordered list of sinks.
///
/// The sink list is swapped atomically on reload: a call takes a snapshot
/// of the list on entry and only ever writes to that snapshot.
pub struct Logger {
    registry: Arc<LevelRegistry>,
    sinks: RwLock<Arc<Vec<Arc<dyn Sink>>>>,
    override_level: RwLock<Option<Level>>,
    open: AtomicBool,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("sinks", &self.sink_names())
            .field("override_level", &self.level_override())
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl Logger {
    /// Creates an open logger with no sinks.
    #[must_use]
    pub fn new(registry: Arc<LevelRegistry>) -> Self {
        Self::with_sinks(registry, Vec::new())
    }

    /// Creates an open logger over the given sinks, in fan-out order.
    #[must_use]
    pub fn with_sinks(registry: Arc<LevelRegistry>, sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self {
            registry,
            sinks: RwLock::new(Arc::new(sinks)),
            override_level: RwLock::new(None),
            open: AtomicBool::new(true),
        }
    }

    /// Creates a logger from configuration.
    ///
    /// Sinks that fail to build are skipped and reported.
    #[must_use]
    pub fn from_config(config: &LoggerConfig, registry: Arc<LevelRegistry>) -> Self {
        let sinks = build_sinks(config, &registry);
        Self::with_sinks(registry, sinks)
    }

    /// The level registry shared with the sinks.
    #[must_use]
    pub fn registry(&self) -> &Arc<LevelRegistry> {
        &self.registry
    }

    /// Appends a sink to the end of the fan-out order.
    pub fn add_sink(&self, sink: Arc<dyn Sink>) {
        let mut sinks = self.sinks.write();
        let mut next: Vec<Arc<dyn Sink>> = sinks.iter().cloned().collect();
        next.push(sink);
        *sinks = Arc::new(next);
    }

    /// Installs a new sink list and closes the previous one.
    ///
    /// Calls already in flight finish against the old sinks; no new call
    /// reaches them once this returns.
    pub fn replace_sinks(&self, sinks: Vec<Arc<dyn Sink>>) {
        let previous = std::mem::replace(&mut *self.sinks.write(), Arc::new(sinks));
        for sink in previous.iter() {
            sink.flush();
            sink.close();
        }
    }

    /// Rebuilds every sink from `config` and swaps them in.
    ///
    /// Returns the number of sinks now installed.
    pub fn reload(&self, config: &LoggerConfig) -> usize {
        let sinks = build_sinks(config, &self.registry);
        let count = sinks.len();
        self.replace_sinks(sinks);
        debug!(sinks = count, "logger sinks reloaded");
        count
    }

    /// Reloads this logger whenever `path` changes on disk.
    ///
    /// The file is loaded once immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, the watcher cannot start,
    /// or the initial load fails.
    pub fn watch_config(self: &Arc<Self>, watcher: &ConfigWatcher, path: impl AsRef<Path>) -> Result<()> {
        watcher.add_file_changed_listener(path, Arc::clone(self), |path, logger: &Self| {
            let config = LoggerConfig::load(path)?;
            logger.reload(&config);
            Ok(())
        })
    }

    /// Names of the installed sinks, in fan-out order.
    #[must_use]
    pub fn sink_names(&self) -> Vec<String> {
        self.snapshot().iter().map(|s| s.name().to_string()).collect()
    }

    /// Number of installed sinks.
    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.snapshot().len()
    }

    /// Sets a level that gates every call before any sink sees it.
    pub fn set_level(&self, level: Level) {
        *self.override_level.write() = Some(level);
    }

    /// Removes the override level.
    pub fn clear_level(&self) {
        *self.override_level.write() = None;
    }

    /// The override level, if set.
    #[must_use]
    pub fn level_override(&self) -> Option<Level> {
        *self.override_level.read()
    }

    /// The effective top-level threshold: the override if set, otherwise
    /// the most verbose sink level.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level_override().unwrap_or_else(|| {
            self.snapshot()
                .iter()
                .map(|s| s.level())
                .max()
                .unwrap_or(Level::OFF)
        })
    }

    /// Returns true if some sink would accept a record at `level`.
    ///
    /// This is a disjunction over sinks: a `true` answer does not mean every
    /// sink will write the record, only that at least one might. Use it to
    /// skip building expensive arguments.
    #[must_use]
    pub fn is_level_enabled(&self, level: Level) -> bool {
        if !self.is_open() {
            return false;
        }
        if let Some(limit) = self.level_override() {
            if !level.is_enabled_for(limit) {
                return false;
            }
        }
        self.snapshot().iter().any(|s| s.admits(level))
    }

    /// Shorthand for [`Self::is_level_enabled`] at PANIC.
    #[must_use]
    pub fn is_panic_enabled(&self) -> bool {
        self.is_level_enabled(Level::PANIC)
    }

    /// Shorthand for [`Self::is_level_enabled`] at FATAL.
    #[must_use]
    pub fn is_fatal_enabled(&self) -> bool {
        self.is_level_enabled(Level::FATAL)
    }

    /// Shorthand for [`Self::is_level_enabled`] at ERROR.
    #[must_use]
    pub fn is_error_enabled(&self) -> bool {
        self.is_level_enabled(Level::ERROR)
    }

    /// Shorthand for [`Self::is_level_enabled`] at WARN.
    #[must_use]
    pub fn is_warn_enabled(&self) -> bool {
        self.is_level_enabled(Level::WARN)
    }

    /// Shorthand for [`Self::is_level_enabled`] at INFO.
    #[must_use]
    pub fn is_info_enabled(&self) -> bool {
        self.is_level_enabled(Level::INFO)
    }

    /// Shorthand for [`Self::is_level_enabled`] at DEBUG.
    #[must_use]
    pub fn is_debug_enabled(&self) -> bool {
        self.is_level_enabled(Level::DEBUG)
    }

    /// Shorthand for [`Self::is_level_enabled`] at TRACE.
    #[must_use]
    pub fn is_trace_enabled(&self) -> bool {
        self.is_level_enabled(Level::TRACE)
    }

    /// Returns true until [`Self::close`] is called.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Re-enables logging after [`Self::close`]. Idempotent.
    ///
    /// Closed sinks stay closed; reload to get fresh ones.
    pub fn open(&self) {
        self.open.store(true, Ordering::Release);
    }

    /// Stops all logging and closes every sink. Idempotent.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            for sink in self.snapshot().iter() {
                sink.flush();
                sink.close();
            }
        }
    }

    /// Flushes every sink.
    pub fn flush(&self) {
        for sink in self.snapshot().iter() {
            sink.flush();
        }
    }

    /// Logs `message` at `level` and reports whether the caller must escalate.
    #[track_caller]
    pub fn log<'a>(&self, level: Level, message: impl Into<Message<'a>>) -> Outcome {
        self.dispatch(level, message.into(), Location::caller())
    }

    /// Logs at PANIC. The caller should unwind on [`Outcome::Abort`].
    #[track_caller]
    #[must_use]
    pub fn panic<'a>(&self, message: impl Into<Message<'a>>) -> Outcome {
        self.dispatch(Level::PANIC, message.into(), Location::caller())
    }

    /// Logs at FATAL. The process should exit on [`Outcome::Terminate`].
    #[track_caller]
    #[must_use]
    pub fn fatal<'a>(&self, message: impl Into<Message<'a>>) -> Outcome {
        self.dispatch(Level::FATAL, message.into(), Location::caller())
    }

    /// Logs at ERROR.
    #[track_caller]
    pub fn error<'a>(&self, message: impl Into<Message<'a>>) {
        self.dispatch(Level::ERROR, message.into(), Location::caller());
    }

    /// Logs at WARN.
    #[track_caller]
    pub fn warn<'a>(&self, message: impl Into<Message<'a>>) {
        self.dispatch(Level::WARN, message.into(), Location::caller());
    }

    /// Logs at INFO.
    #[track_caller]
    pub fn info<'a>(&self, message: impl Into<Message<'a>>) {
        self.dispatch(Level::INFO, message.into(), Location::caller());
    }

    /// Logs at DEBUG.
    #[track_caller]
    pub fn debug<'a>(&self, message: impl Into<Message<'a>>) {
        self.dispatch(Level::DEBUG, message.into(), Location::caller());
    }

    /// Logs at TRACE.
    #[track_caller]
    pub fn trace<'a>(&self, message: impl Into<Message<'a>>) {
        self.dispatch(Level::TRACE, message.into(), Location::caller());
    }

    fn snapshot(&self) -> Arc<Vec<Arc<dyn Sink>>> {
        Arc::clone(&self.sinks.read())
    }

    fn dispatch(
        &self,
        level: Level,
        message: Message<'_>,
        location: &'static Location<'static>,
    ) -> Outcome {
        if !self.is_open() {
            return Outcome::Ignored;
        }
        if let Some(limit) = self.level_override() {
            if !level.is_enabled_for(limit) {
                return Outcome::Ignored;
            }
        }

        let timestamp = Local::now();
        let sinks = self.snapshot();

        let text: Option<Cow<'_, str>> = match message {
            Message::Text(text) => Some(text),
            Message::Args(args) => Some(
                args.as_str()
                    .map_or_else(|| Cow::Owned(args.to_string()), Cow::Borrowed),
            ),
            Message::Display(value) => Some(Cow::Owned(value.to_string())),
            Message::Lazy(producer) => {
                if sinks.iter().any(|s| s.admits(level)) {
                    match producer() {
                        Ok(text) => Some(Cow::Owned(text)),
                        Err(e) => {
                            let err = LogError::Producer(e.to_string());
                            warn!(level = %level, error = %err, "dropping log record");
                            None
                        }
                    }
                } else {
                    None
                }
            }
        };

        if let Some(text) = text.as_deref() {
            let record = Record::new(timestamp, level, text).with_location(location);
            for sink in sinks.iter() {
                sink.before(timestamp);
                match sink.write(&record) {
                    Ok(written) => sink.after(timestamp, written),
                    Err(e) => {
                        error!(sink = sink.name(), level = %level, error = %e, "log sink write failed");
                    }
                }
            }
        }

        match level {
            Level::FATAL => Outcome::Terminate,
            Level::PANIC => Outcome::Abort(text.map(Cow::into_owned).unwrap_or_default()),
            _ => Outcome::Accepted,
        }
    }
}

/// Builds every enabled sink in `config`, skipping ones that fail.
fn build_sinks(config: &LoggerConfig, registry: &Arc<LevelRegistry>) -> Vec<Arc<dyn Sink>> {
    let mut sinks: Vec<Arc<dyn Sink>> = Vec::with_capacity(config.loggers.len());
    for (index, sink_config) in config.loggers.iter().enumerate() {
        match build_sink(sink_config, config, Arc::clone(registry)) {
            Ok(Some(sink)) => sinks.push(Arc::from(sink)),
            Ok(None) => {}
            Err(e) => {
                warn!(index, output = ?sink_config.output, error = %e, "skipping log sink");
            }
        }
    }
    sinks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SinkConfig;
    use crate::console::WriterSink;
    use crate::format::{HeaderFlags, RecordFormatter};
    use chrono::DateTime;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    type MemorySink = WriterSink<Vec<u8>>;

    fn memory_sink(registry: &Arc<LevelRegistry>, name: &str, level: Level) -> Arc<MemorySink> {
        let formatter =
            RecordFormatter::new(Arc::clone(registry), level).with_flags(HeaderFlags::NONE);
        Arc::new(WriterSink::new(name, formatter, Vec::new()))
    }

    fn contents(sink: &MemorySink) -> String {
        sink.with_output(|buf| String::from_utf8_lossy(buf).into_owned())
            .unwrap_or_default()
    }

    /// Records hook calls into a shared journal.
    struct JournalSink {
        name: String,
        level: Level,
        fail: bool,
        journal: Arc<Mutex<Vec<String>>>,
        timestamps: Mutex<Vec<DateTime<Local>>>,
        closed: AtomicBool,
    }

    impl JournalSink {
        fn new(name: &str, level: Level, journal: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                level,
                fail: false,
                journal: Arc::clone(journal),
                timestamps: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            })
        }

        fn failing(name: &str, journal: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                level: Level::ALL,
                fail: true,
                journal: Arc::clone(journal),
                timestamps: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            })
        }
    }

    impl Sink for JournalSink {
        fn name(&self) -> &str {
            &self.name
        }

        fn level(&self) -> Level {
            self.level
        }

        fn before(&self, timestamp: DateTime<Local>) {
            self.timestamps.lock().push(timestamp);
            self.journal.lock().push(format!("{}:before", self.name));
        }

        fn write(&self, record: &Record<'_>) -> Result<usize> {
            if self.fail {
                return Err(LogError::Io(std::io::Error::other("broken pipe")));
            }
            if !self.admits(record.level) {
                return Ok(0);
            }
            self.journal
                .lock()
                .push(format!("{}:write:{}", self.name, record.text));
            Ok(record.text.len())
        }

        fn after(&self, _timestamp: DateTime<Local>, written: usize) {
            self.journal
                .lock()
                .push(format!("{}:after:{written}", self.name));
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn logger_fans_out_in_declaration_order() {
        let registry = LevelRegistry::shared();
        let journal = Arc::new(Mutex::new(Vec::new()));
        let logger = Logger::with_sinks(
            registry,
            vec![
                JournalSink::new("a", Level::ALL, &journal),
                JournalSink::new("b", Level::ALL, &journal),
            ],
        );

        assert_eq!(logger.log(Level::INFO, "hi"), Outcome::Accepted);
        assert_eq!(
            *journal.lock(),
            vec![
                "a:before",
                "a:write:hi",
                "a:after:2",
                "b:before",
                "b:write:hi",
                "b:after:2"
            ]
        );
    }

    #[test]
    fn logger_applies_per_sink_levels() {
        let registry = LevelRegistry::shared();
        let errors = memory_sink(&registry, "errors", Level::ERROR);
        let verbose = memory_sink(&registry, "verbose", Level::DEBUG);
        let logger = Logger::with_sinks(registry, vec![errors.clone(), verbose.clone()]);

        logger.info("started");
        logger.error("failed");

        assert_eq!(contents(&errors), "ERROR failed\n");
        assert_eq!(contents(&verbose), "INFO  started\nERROR failed\n");
    }

    #[test]
    fn logger_every_sink_sees_same_timestamp() {
        let registry = LevelRegistry::shared();
        let journal = Arc::new(Mutex::new(Vec::new()));
        let a = JournalSink::new("a", Level::ALL, &journal);
        let b = JournalSink::new("b", Level::ALL, &journal);
        let logger = Logger::with_sinks(registry, vec![a.clone(), b.clone()]);

        logger.info("tick");
        assert_eq!(*a.timestamps.lock(), *b.timestamps.lock());
    }

    #[test]
    fn logger_formats_arguments() {
        let registry = LevelRegistry::shared();
        let sink = memory_sink(&registry, "mem", Level::ALL);
        let logger = Logger::with_sinks(registry, vec![sink.clone()]);

        logger.log(Level::INFO, format_args!("started {}", "ok"));
        logger.log(Level::WARN, Message::display(&42));
        logger.log(Level::ERROR, String::from("owned"));

        assert_eq!(contents(&sink), "INFO  started ok\nWARN  42\nERROR owned\n");
    }

    #[test]
    fn logger_closed_ignores_everything() {
        let registry = LevelRegistry::shared();
        let sink = memory_sink(&registry, "mem", Level::ALL);
        let logger = Logger::with_sinks(registry, vec![sink.clone()]);

        logger.close();
        logger.close();
        assert!(!logger.is_open());
        assert_eq!(logger.log(Level::ERROR, "nope"), Outcome::Ignored);
        assert_eq!(logger.fatal("nope"), Outcome::Ignored);
        assert!(!logger.is_level_enabled(Level::ERROR));
        assert!(sink.is_closed());
    }

    #[test]
    fn logger_override_level_gates_first() {
        let registry = LevelRegistry::shared();
        let sink = memory_sink(&registry, "mem", Level::ALL);
        let logger = Logger::with_sinks(registry, vec![sink.clone()]);

        logger.set_level(Level::WARN);
        assert_eq!(logger.level(), Level::WARN);
        assert_eq!(logger.log(Level::INFO, "hidden"), Outcome::Ignored);
        assert_eq!(logger.log(Level::WARN, "shown"), Outcome::Accepted);
        assert!(!logger.is_info_enabled());

        logger.clear_level();
        assert_eq!(logger.level(), Level::ALL);
        logger.info("back");

        assert_eq!(contents(&sink), "WARN  shown\nINFO  back\n");
    }

    #[test]
    fn logger_override_does_not_widen_sink_level() {
        let registry = LevelRegistry::shared();
        let sink = memory_sink(&registry, "mem", Level::INFO);
        let logger = Logger::with_sinks(registry, vec![sink.clone()]);

        logger.set_level(Level::TRACE);
        logger.debug("still dropped by the sink");
        assert!(contents(&sink).is_empty());
    }

    #[test]
    fn is_level_enabled_is_disjunctive() {
        let registry = LevelRegistry::shared();
        let quiet = memory_sink(&registry, "quiet", Level::ERROR);
        let chatty = memory_sink(&registry, "chatty", Level::DEBUG);
        let logger = Logger::with_sinks(registry, vec![quiet, chatty]);

        assert!(logger.is_panic_enabled());
        assert!(logger.is_fatal_enabled());
        assert!(logger.is_debug_enabled());
        assert!(logger.is_error_enabled());
        assert!(!logger.is_trace_enabled());
        assert!(logger.is_warn_enabled());

        let registry = LevelRegistry::shared();
        let silent = memory_sink(&registry, "silent", Level::OFF);
        let logger = Logger::with_sinks(registry, vec![silent]);
        assert!(!logger.is_panic_enabled());
        assert!(!logger.is_fatal_enabled());
    }

    #[test]
    fn lazy_producer_skipped_when_no_sink_admits() {
        let registry = LevelRegistry::shared();
        let sink = memory_sink(&registry, "mem", Level::INFO);
        let logger = Logger::with_sinks(registry, vec![sink.clone()]);
        let calls = AtomicUsize::new(0);

        logger.log(
            Level::DEBUG,
            Message::lazy(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("expensive".to_string())
            }),
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!logger.is_level_enabled(Level::DEBUG));

        logger.log(
            Level::INFO,
            Message::lazy(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("expensive".to_string())
            }),
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(contents(&sink), "INFO  expensive\n");
    }

    #[test]
    fn lazy_producer_failure_is_swallowed() {
        let registry = LevelRegistry::shared();
        let sink = memory_sink(&registry, "mem", Level::ALL);
        let logger = Logger::with_sinks(registry, vec![sink.clone()]);

        let outcome = logger.log(Level::INFO, Message::lazy(|| Err("no data".into())));
        assert_eq!(outcome, Outcome::Accepted);
        assert!(contents(&sink).is_empty());
    }

    #[test]
    fn sink_error_does_not_stop_fan_out() {
        let registry = LevelRegistry::shared();
        let journal = Arc::new(Mutex::new(Vec::new()));
        let logger = Logger::with_sinks(
            registry,
            vec![
                JournalSink::failing("bad", &journal),
                JournalSink::new("good", Level::ALL, &journal),
            ],
        );

        logger.warn("still here");
        let journal = journal.lock();
        assert!(!journal.iter().any(|e| e.starts_with("bad:after")));
        assert!(journal.contains(&"good:write:still here".to_string()));
    }

    #[test]
    fn fatal_and_panic_escalate_after_fan_out() {
        let registry = LevelRegistry::shared();
        let quiet = memory_sink(&registry, "quiet", Level::OFF);
        let loud = memory_sink(&registry, "loud", Level::ALL);
        let logger = Logger::with_sinks(registry, vec![quiet.clone(), loud.clone()]);

        assert_eq!(logger.fatal("disk gone"), Outcome::Terminate);
        assert_eq!(
            logger.panic(format_args!("bad state {}", 7)),
            Outcome::Abort("bad state 7".to_string())
        );
        assert_eq!(contents(&loud), "FATAL disk gone\nPANIC bad state 7\n");
        assert!(contents(&quiet).is_empty());
    }

    #[test]
    fn escalation_is_not_gated_by_sink_levels() {
        let registry = LevelRegistry::shared();
        let quiet = memory_sink(&registry, "quiet", Level::OFF);
        let logger = Logger::with_sinks(registry, vec![quiet]);
        assert!(logger.fatal("unseen").is_escalation());
    }

    #[test]
    #[should_panic(expected = "bad state")]
    fn outcome_abort_escalates_to_panic() {
        Outcome::Abort("bad state".to_string()).escalate();
    }

    #[test]
    fn outcome_accepted_escalate_returns() {
        Outcome::Accepted.escalate();
        Outcome::Ignored.escalate();
        assert!(!Outcome::Accepted.is_escalation());
    }

    #[test]
    fn replace_sinks_closes_previous() {
        let registry = LevelRegistry::shared();
        let journal = Arc::new(Mutex::new(Vec::new()));
        let old = JournalSink::new("old", Level::ALL, &journal);
        let logger = Logger::with_sinks(Arc::clone(&registry), vec![old.clone()]);

        let fresh = memory_sink(&registry, "fresh", Level::ALL);
        logger.replace_sinks(vec![fresh.clone()]);
        logger.info("after swap");

        assert!(old.closed.load(Ordering::SeqCst));
        assert!(!journal.lock().iter().any(|e| e.contains("after swap")));
        assert_eq!(contents(&fresh), "INFO  after swap\n");
        assert_eq!(logger.sink_names(), vec!["fresh"]);
    }

    #[test]
    fn add_sink_appends() {
        let registry = LevelRegistry::shared();
        let logger = Logger::new(Arc::clone(&registry));
        assert_eq!(logger.sink_count(), 0);
        assert_eq!(logger.level(), Level::OFF);

        logger.add_sink(memory_sink(&registry, "one", Level::INFO));
        logger.add_sink(memory_sink(&registry, "two", Level::DEBUG));
        assert_eq!(logger.sink_names(), vec!["one", "two"]);
        assert_eq!(logger.level(), Level::DEBUG);
    }

    #[test]
    fn reload_builds_from_config_and_skips_bad_sinks() {
        let dir = tempfile::TempDir::new().expect("create temp dir");
        let registry = LevelRegistry::shared();
        let logger = Logger::new(registry);

        let path = dir.path().join("app.log");
        let config = LoggerConfig {
            level: "INFO".to_string(),
            flag: String::new(),
            loggers: vec![
                SinkConfig::file(path.to_string_lossy()),
                SinkConfig {
                    level: "NOPE".to_string(),
                    ..SinkConfig::stdout()
                },
            ],
            ..LoggerConfig::default()
        };

        assert_eq!(logger.reload(&config), 1);
        logger.info("to file");
        logger.flush();
        assert_eq!(
            std::fs::read_to_string(&path).expect("read log"),
            "INFO  to file\n"
        );
    }

    #[test]
    fn custom_level_is_dispatched_with_its_name() {
        let registry = LevelRegistry::shared();
        let verbose = registry.register("VERBOSE", 650).expect("register");
        let sink = memory_sink(&registry, "mem", Level::TRACE);
        let logger = Logger::with_sinks(registry, vec![sink.clone()]);

        logger.log(verbose, "detail");
        assert_eq!(contents(&sink), "VERBOSE detail\n");
    }
}
