//! Sluice logging.
//!
//! Leveled logging for the queue dispatcher and the cron scheduler, with two
//! entry points:
//!
//! - the `trace!`..`error!` macros, which write through the process-wide
//!   configuration (used for internal diagnostics in stores and adapters);
//! - the [`Logger`] handle, which is passed explicitly to long-running
//!   components so that operational events (lock refused, kill-sentinel seen,
//!   per-message failures) can be redirected or captured in tests.
//!
//! # Usage
//!
//! ```rust
//! use sluice_log::{debug, info, warn, error, Logger};
//!
//! info!("Dispatcher starting on queue {}", "mail");
//! debug!(target: "sluice::store", "claimed message {}", 42);
//!
//! let logger = Logger::new("sluice::dispatcher");
//! logger.warn("kill sentinel detected");
//! ```
//!
//! # Environment Variables
//!
//! - `SLUICE_DEBUG=1` - Shorthand for `SLUICE_LOG_LEVEL=debug`
//! - `SLUICE_LOG_LEVEL=trace|debug|info|warn|error|critical|off` - Set log level
//! - `SLUICE_LOG_FORMAT=pretty|json|compact` - Set output format
//! - `SLUICE_LOG_COLOR=1|0` - Enable/disable colors
//! - `SLUICE_LOG_TIMESTAMPS=1|0` - Include timestamps

mod logger;

pub use logger::{LogSink, Logger, MemorySink, Record, StderrSink};

use once_cell::sync::Lazy;
use std::env;
use std::io::Write;
use std::sync::atomic::{AtomicU8, Ordering};

// ============================================================================
// Log Levels
// ============================================================================

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Level {
    /// Trace level (most verbose)
    Trace = 0,
    /// Debug level
    Debug = 1,
    /// Info level
    Info = 2,
    /// Warning level
    Warn = 3,
    /// Error level
    Error = 4,
    /// Critical level, for conditions that stop a run or a message
    Critical = 5,
    /// Off (no logging)
    Off = 6,
}

impl Level {
    /// Get level from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "critical" | "crit" => Some(Level::Critical),
            "off" | "none" => Some(Level::Off),
            _ => None,
        }
    }

    /// Get level name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Critical => "CRIT",
            Level::Off => "OFF",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Level::Trace,
            1 => Level::Debug,
            2 => Level::Info,
            3 => Level::Warn,
            4 => Level::Error,
            5 => Level::Critical,
            _ => Level::Off,
        }
    }

    /// Get colored level name (if color feature enabled).
    #[cfg(feature = "color")]
    pub fn colored(&self) -> colored::ColoredString {
        use colored::Colorize;
        match self {
            Level::Trace => "TRACE".magenta(),
            Level::Debug => "DEBUG".blue(),
            Level::Info => "INFO".green(),
            Level::Warn => "WARN".yellow(),
            Level::Error => "ERROR".red(),
            Level::Critical => "CRIT".red().bold(),
            Level::Off => "OFF".white(),
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Log Format
// ============================================================================

/// Output format for log messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    /// Multi-field human readable format
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON format for structured logging
    Json,
}

impl Format {
    fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(Format::Pretty),
            "compact" => Some(Format::Compact),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

// ============================================================================
// Global Configuration
// ============================================================================

static LOG_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

static CONFIG: Lazy<LogConfig> = Lazy::new(LogConfig::from_env);

/// Process-wide output settings read from the environment.
#[derive(Debug)]
pub(crate) struct LogConfig {
    format: Format,
    #[cfg_attr(not(any(feature = "color", feature = "tracing")), allow(dead_code))]
    color: bool,
    timestamps: bool,
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

impl LogConfig {
    fn from_env() -> Self {
        let debug = env_flag("SLUICE_DEBUG").unwrap_or(false);

        let level = env::var("SLUICE_LOG_LEVEL")
            .ok()
            .and_then(|s| Level::from_str(&s))
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = env::var("SLUICE_LOG_FORMAT")
            .ok()
            .and_then(|s| Format::from_str(&s))
            .unwrap_or(Format::Pretty);

        let color = env_flag("SLUICE_LOG_COLOR")
            .unwrap_or_else(|| env::var("NO_COLOR").is_err() && env::var("TERM").is_ok());

        let timestamps = env_flag("SLUICE_LOG_TIMESTAMPS").unwrap_or(true);

        LOG_LEVEL.store(level as u8, Ordering::SeqCst);

        Self {
            format,
            color,
            timestamps,
        }
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Initialize the logging system.
///
/// Called implicitly by the first record written; binaries call it early so
/// that a level set with [`set_level`] is not overwritten by the lazy load.
pub fn init() {
    Lazy::force(&CONFIG);
}

/// Check if a log level is enabled.
#[inline]
pub fn is_level_enabled(level: Level) -> bool {
    level != Level::Off && level as u8 >= LOG_LEVEL.load(Ordering::Relaxed)
}

/// Get current log level.
pub fn current_level() -> Level {
    Level::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Set log level at runtime.
pub fn set_level(level: Level) {
    init();
    LOG_LEVEL.store(level as u8, Ordering::SeqCst);
}

fn config() -> &'static LogConfig {
    &CONFIG
}

// ============================================================================
// Log Output
// ============================================================================

/// Log a message with the given level through the global configuration.
#[doc(hidden)]
pub fn log(level: Level, target: &str, message: &str) {
    init();
    if !is_level_enabled(level) {
        return;
    }
    write_stderr(&Record::new(level, target, message));
}

pub(crate) fn write_stderr(record: &Record) {
    let config = config();

    match config.format {
        Format::Pretty => log_pretty(record, config),
        Format::Compact => log_compact(record, config),
        Format::Json => log_json(record),
    }
}

fn log_pretty(record: &Record, config: &LogConfig) {
    let mut stderr = std::io::stderr().lock();

    if config.timestamps {
        let local = record.timestamp.with_timezone(&chrono::Local);
        let _ = write!(stderr, "{} ", local.format("%Y-%m-%d %H:%M:%S%.3f"));
    }

    #[cfg(feature = "color")]
    if config.color {
        let _ = write!(stderr, "{:5} ", record.level.colored());
    } else {
        let _ = write!(stderr, "{:5} ", record.level.as_str());
    }

    #[cfg(not(feature = "color"))]
    let _ = write!(stderr, "{:5} ", record.level.as_str());

    if !record.target.is_empty() {
        let _ = write!(stderr, "[{}] ", record.target);
    }

    let _ = writeln!(stderr, "{}", record.message);
}

fn log_compact(record: &Record, config: &LogConfig) {
    let mut stderr = std::io::stderr().lock();

    if config.timestamps {
        let local = record.timestamp.with_timezone(&chrono::Local);
        let _ = write!(stderr, "{} ", local.format("%H:%M:%S"));
    }

    let _ = write!(
        stderr,
        "{} ",
        record.level.as_str().chars().next().unwrap_or('?')
    );

    if !record.target.is_empty() {
        let _ = write!(stderr, "{}: ", record.target);
    }

    let _ = writeln!(stderr, "{}", record.message);
}

fn log_json(record: &Record) {
    use serde::Serialize;

    #[derive(Serialize)]
    struct LogEntry<'a> {
        timestamp: String,
        level: &'a str,
        target: &'a str,
        message: &'a str,
    }

    let entry = LogEntry {
        timestamp: record.timestamp.to_rfc3339(),
        level: record.level.as_str(),
        target: &record.target,
        message: &record.message,
    };

    if let Ok(json) = serde_json::to_string(&entry) {
        let _ = writeln!(std::io::stderr().lock(), "{}", json);
    }
}

// ============================================================================
// Macros
// ============================================================================

/// Log a trace message.
#[macro_export]
macro_rules! trace {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Trace) {
            $crate::log($crate::Level::Trace, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Trace) {
            $crate::log($crate::Level::Trace, module_path!(), &format!($($arg)+));
        }
    };
}

/// Log a debug message.
///
/// Only enabled when `SLUICE_DEBUG=1` or `SLUICE_LOG_LEVEL=debug`.
///
/// # Example
///
/// ```rust
/// use sluice_log::debug;
///
/// let id = 7;
/// debug!("claimed message {}", id);
/// debug!(target: "sluice::store", "pending count: {}", 3);
/// ```
#[macro_export]
macro_rules! debug {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Debug) {
            $crate::log($crate::Level::Debug, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Debug) {
            $crate::log($crate::Level::Debug, module_path!(), &format!($($arg)+));
        }
    };
}

/// Log an info message.
#[macro_export]
macro_rules! info {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Info) {
            $crate::log($crate::Level::Info, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Info) {
            $crate::log($crate::Level::Info, module_path!(), &format!($($arg)+));
        }
    };
}

/// Log a warning message.
#[macro_export]
macro_rules! warn {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Warn) {
            $crate::log($crate::Level::Warn, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Warn) {
            $crate::log($crate::Level::Warn, module_path!(), &format!($($arg)+));
        }
    };
}

/// Log an error message.
#[macro_export]
macro_rules! error {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Error) {
            $crate::log($crate::Level::Error, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Error) {
            $crate::log($crate::Level::Error, module_path!(), &format!($($arg)+));
        }
    };
}

// ============================================================================
// Tracing Integration
// ============================================================================

#[cfg(feature = "tracing")]
pub mod tracing_compat {
    //! Tracing compatibility layer.
    //!
    //! Collaborator crates (the SMTP mailer) emit `tracing` events; this
    //! subscriber renders them at the level configured by `SLUICE_LOG_LEVEL`.

    use super::*;

    /// Create a tracing subscriber that respects the sluice log config.
    pub fn subscriber() -> impl tracing::Subscriber {
        use tracing_subscriber::prelude::*;
        use tracing_subscriber::{EnvFilter, fmt};

        let config = config();
        let level = match current_level() {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error | Level::Critical => "error",
            Level::Off => "off",
        };

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_ansi(config.color))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Critical);
        assert!(Level::Critical < Level::Off);
    }

    #[test]
    fn test_level_from_str() {
        assert_eq!(Level::from_str("debug"), Some(Level::Debug));
        assert_eq!(Level::from_str("DEBUG"), Some(Level::Debug));
        assert_eq!(Level::from_str("warning"), Some(Level::Warn));
        assert_eq!(Level::from_str("critical"), Some(Level::Critical));
        assert_eq!(Level::from_str("crit"), Some(Level::Critical));
        assert_eq!(Level::from_str("invalid"), None);
    }

    #[test]
    fn test_level_round_trips_through_u8() {
        for level in [
            Level::Trace,
            Level::Debug,
            Level::Info,
            Level::Warn,
            Level::Error,
            Level::Critical,
            Level::Off,
        ] {
            assert_eq!(Level::from_u8(level as u8), level);
        }
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!(Format::from_str("pretty"), Some(Format::Pretty));
        assert_eq!(Format::from_str("compact"), Some(Format::Compact));
        assert_eq!(Format::from_str("JSON"), Some(Format::Json));
        assert_eq!(Format::from_str("xml"), None);
    }

    #[test]
    fn test_off_is_never_enabled() {
        assert!(!is_level_enabled(Level::Off));
    }

    #[test]
    fn test_macros_compile() {
        trace!("trace message");
        debug!("debug message");
        info!("info message");
        warn!("warn message");
        error!("error message");

        info!(target: "test", "with target {}", 1);
        warn!(target: "test", "with target");
    }
}
