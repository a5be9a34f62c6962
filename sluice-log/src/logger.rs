//! Injectable logger handle.

use crate::{Level, is_level_enabled, write_stderr};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

/// A single log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// When the record was produced
    pub timestamp: DateTime<Utc>,
    /// Severity
    pub level: Level,
    /// Component that emitted the record
    pub target: String,
    /// Rendered message
    pub message: String,
}

impl Record {
    /// Create a record stamped with the current time.
    pub fn new(level: Level, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            target: target.into(),
            message: message.into(),
        }
    }
}

/// Destination for log records.
pub trait LogSink: Send + Sync {
    /// Whether records at `level` should be delivered at all.
    fn enabled(&self, level: Level) -> bool {
        is_level_enabled(level)
    }

    /// Deliver a record.
    fn write(&self, record: &Record);
}

/// Sink that renders records to stderr using the global format.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl LogSink for StderrSink {
    fn write(&self, record: &Record) {
        write_stderr(record);
    }
}

/// Sink that keeps every record in memory.
///
/// Captures regardless of the global level so tests can assert on
/// warnings and criticals without touching process-wide state.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<Record>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the captured records.
    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Captured records at exactly `level`.
    pub fn at_level(&self, level: Level) -> Vec<Record> {
        self.records()
            .into_iter()
            .filter(|r| r.level == level)
            .collect()
    }

    /// Whether any captured message at `level` contains `needle`.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.at_level(level)
            .iter()
            .any(|r| r.message.contains(needle))
    }

    /// Drop all captured records.
    pub fn clear(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }
}

impl LogSink for MemorySink {
    fn enabled(&self, _level: Level) -> bool {
        true
    }

    fn write(&self, record: &Record) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
    }
}

/// Cheaply clonable logger bound to a target and a sink.
#[derive(Clone)]
pub struct Logger {
    target: Arc<str>,
    sink: Arc<dyn LogSink>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new("sluice")
    }
}

impl Logger {
    /// Logger writing to stderr.
    pub fn new(target: impl AsRef<str>) -> Self {
        crate::init();
        Self {
            target: Arc::from(target.as_ref()),
            sink: Arc::new(StderrSink),
        }
    }

    /// Logger writing to a custom sink.
    pub fn with_sink(target: impl AsRef<str>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            target: Arc::from(target.as_ref()),
            sink,
        }
    }

    /// Logger sharing this sink under `<target>::<suffix>`.
    pub fn child(&self, suffix: &str) -> Self {
        Self {
            target: Arc::from(format!("{}::{}", self.target, suffix)),
            sink: Arc::clone(&self.sink),
        }
    }

    /// The target records are tagged with.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Emit a message at `level`.
    pub fn log(&self, level: Level, message: impl AsRef<str>) {
        if level == Level::Off || !self.sink.enabled(level) {
            return;
        }
        self.sink
            .write(&Record::new(level, &*self.target, message.as_ref()));
    }

    pub fn trace(&self, message: impl AsRef<str>) {
        self.log(Level::Trace, message);
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(Level::Debug, message);
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(Level::Info, message);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(Level::Warn, message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(Level::Error, message);
    }

    pub fn critical(&self, message: impl AsRef<str>) {
        self.log(Level::Critical, message);
    }
}
