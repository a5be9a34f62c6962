//! Persisted cron task definitions and run logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::callable::HEARTBEAT_PULSE;
use crate::expression::CronPresets;

/// A scheduled task definition.
///
/// The scheduler only reads tasks; enabling or disabling one is an
/// operator action through the task store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronTask {
    /// Store-assigned id (0 until persisted)
    pub id: i64,

    /// Human-readable title, recorded in the run log
    pub title: String,

    /// Cron expression; tasks without one are never evaluated
    pub schedule_expression: Option<String>,

    /// Key into the callable registry
    pub callable_ref: String,

    /// Inactive tasks are never evaluated
    pub active: bool,
}

impl CronTask {
    /// New active task.
    pub fn new(
        title: impl Into<String>,
        schedule_expression: impl Into<String>,
        callable_ref: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            title: title.into(),
            schedule_expression: Some(schedule_expression.into()),
            callable_ref: callable_ref.into(),
            active: true,
        }
    }

    /// Mark the task inactive.
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// The every-minute task that makes each tick write a log row.
    pub fn heartbeat() -> Self {
        Self::new(HEARTBEAT_PULSE, CronPresets::EVERY_MINUTE, HEARTBEAT_PULSE)
    }

    /// Whether the scheduler should evaluate this task at all.
    pub fn is_schedulable(&self) -> bool {
        self.active
            && self
                .schedule_expression
                .as_deref()
                .is_some_and(|expr| !expr.trim().is_empty())
    }
}

/// One scheduler tick in which at least one task ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CronLog {
    pub id: i64,

    /// Start of the tick
    pub run_time: DateTime<Utc>,

    /// Comma-joined titles of the tasks that ran
    pub tasks_executed: String,

    /// Tick duration in seconds
    pub duration: f64,
}

impl CronLog {
    pub fn new(run_time: DateTime<Utc>, titles: &[String], duration: f64) -> Self {
        Self {
            id: 0,
            run_time,
            tasks_executed: titles.join(","),
            duration,
        }
    }

    /// Titles recorded for the tick.
    pub fn titles(&self) -> Vec<&str> {
        self.tasks_executed
            .split(',')
            .filter(|t| !t.is_empty())
            .collect()
    }
}
