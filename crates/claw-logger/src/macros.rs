//! Formatting macros over [`Logger`](crate::Logger).
//!
//! Each macro takes the logger first and `format!`-style arguments after.
//! The call site is recorded as the record's location.

/// Logs at an explicit level and evaluates to the [`Outcome`](crate::Outcome).
///
/// ```
/// use claw_logger::{log, Level, LevelRegistry, Logger};
///
/// let logger = Logger::new(LevelRegistry::shared());
/// let outcome = log!(logger, Level::INFO, "started {}", "ok");
/// assert!(!outcome.is_escalation());
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log($level, ::std::format_args!($($arg)+))
    };
}

/// Logs at FATAL and evaluates to the [`Outcome`](crate::Outcome).
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::FATAL, $($arg)+)
    };
}

/// Logs at ERROR.
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {{
        let _ = $crate::log!($logger, $crate::Level::ERROR, $($arg)+);
    }};
}

/// Logs at WARN.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {{
        let _ = $crate::log!($logger, $crate::Level::WARN, $($arg)+);
    }};
}

/// Logs at INFO.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {{
        let _ = $crate::log!($logger, $crate::Level::INFO, $($arg)+);
    }};
}

/// Logs at DEBUG.
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {{
        let _ = $crate::log!($logger, $crate::Level::DEBUG, $($arg)+);
    }};
}

/// Logs at TRACE.
#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => {{
        let _ = $crate::log!($logger, $crate::Level::TRACE, $($arg)+);
    }};
}
