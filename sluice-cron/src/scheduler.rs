//! Single-tick cron scheduler.

use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use sluice_log::Logger;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::callable::{CallableRegistry, TaskContext};
use crate::error::CronResult;
use crate::expression::CronExpression;
use crate::store::{CronLogStore, CronTaskStore};
use crate::task::{CronLog, CronTask};

/// Why a task did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Schedule expression did not parse; the task was not run
    InvalidExpression,
    /// No callable registered under `callable_ref`; the task was not run
    UnknownCallable,
    /// Callable returned an error
    Callable,
    /// Callable panicked
    Panicked,
}

impl FailureKind {
    /// Whether the callable was invoked before failing.
    pub fn was_invoked(&self) -> bool {
        matches!(self, Self::Callable | Self::Panicked)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidExpression => "invalid expression",
            Self::UnknownCallable => "unknown callable",
            Self::Callable => "callable error",
            Self::Panicked => "callable panicked",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub title: String,
    pub kind: FailureKind,
    pub error: String,
}

/// Outcome of one scheduler tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    /// Clock reading at the start of the tick
    pub run_time: DateTime<Utc>,

    /// Number of active scheduled tasks looked at
    pub evaluated: usize,

    /// Titles of the tasks whose callable was invoked, in store order
    pub executed: Vec<String>,

    pub failures: Vec<TaskFailure>,

    /// Row written for this tick, if any task ran
    pub log: Option<CronLog>,
}

impl TickReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Liveness derived from the latest run log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatStatus {
    Alive { last_run: DateTime<Utc> },
    Stale { last_run: DateTime<Utc>, age: TimeDelta },
    Missing,
}

impl HeartbeatStatus {
    pub fn is_alive(&self) -> bool {
        matches!(self, Self::Alive { .. })
    }
}

impl fmt::Display for HeartbeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alive { last_run } => write!(f, "alive (last run {})", last_run.to_rfc3339()),
            Self::Stale { last_run, age } => write!(
                f,
                "stale (last run {}, {}s ago)",
                last_run.to_rfc3339(),
                age.num_seconds()
            ),
            Self::Missing => f.write_str("missing (no cron run recorded)"),
        }
    }
}

/// Evaluates persisted tasks against the clock and runs the due ones.
///
/// Meant to be invoked once a minute by an external trigger (system cron,
/// a timer unit). Each call to [`tick`](Self::tick) is independent.
pub struct CronScheduler {
    tasks: Arc<dyn CronTaskStore>,
    logs: Arc<dyn CronLogStore>,
    callables: Arc<CallableRegistry>,
    clock: Arc<dyn Clock + Send + Sync>,
    logger: Logger,
}

impl CronScheduler {
    pub fn new(
        tasks: Arc<dyn CronTaskStore>,
        logs: Arc<dyn CronLogStore>,
        callables: Arc<CallableRegistry>,
        clock: Arc<dyn Clock + Send + Sync>,
        logger: Logger,
    ) -> Self {
        Self {
            tasks,
            logs,
            callables,
            clock,
            logger,
        }
    }

    /// Run every due task once and record the tick.
    ///
    /// Task failures are logged and reported; they never stop the remaining
    /// tasks or the log write. Only a store failure aborts the tick.
    pub async fn tick(&self) -> CronResult<TickReport> {
        let started = Instant::now();
        let now = self.clock.utc();
        let tasks = self.tasks.active_scheduled().await?;
        self.logger
            .debug(format!("cron tick at {}: {} task(s) to evaluate", now.to_rfc3339(), tasks.len()));

        let mut executed = Vec::new();
        let mut failures = Vec::new();

        for task in &tasks {
            match self.run_if_due(task, now).await {
                Ok(false) => {}
                Ok(true) => executed.push(task.title.clone()),
                Err(failure) => {
                    self.logger.error(format!(
                        "cron task '{}' failed ({}): {}",
                        failure.title, failure.kind, failure.error
                    ));
                    if failure.kind.was_invoked() {
                        executed.push(task.title.clone());
                    }
                    failures.push(failure);
                }
            }
        }

        let log = if executed.is_empty() {
            None
        } else {
            let duration = started.elapsed().as_secs_f64();
            let log = self.logs.append(CronLog::new(now, &executed, duration)).await?;
            self.logger.info(format!(
                "cron tick ran {} task(s) in {:.3}s: {}",
                executed.len(),
                duration,
                log.tasks_executed
            ));
            Some(log)
        };

        Ok(TickReport {
            run_time: now,
            evaluated: tasks.len(),
            executed,
            failures,
            log,
        })
    }

    // Ok(true) when the callable ran to completion.
    async fn run_if_due(&self, task: &CronTask, now: DateTime<Utc>) -> Result<bool, TaskFailure> {
        let failure = |kind: FailureKind, error: String| TaskFailure {
            title: task.title.clone(),
            kind,
            error,
        };

        let expression = task.schedule_expression.as_deref().unwrap_or_default();
        let expression = CronExpression::parse(expression)
            .map_err(|e| failure(FailureKind::InvalidExpression, e.to_string()))?;
        if !expression.is_due(now) {
            return Ok(false);
        }

        let callable = self
            .callables
            .resolve(&task.callable_ref)
            .map_err(|e| failure(FailureKind::UnknownCallable, e.to_string()))?;

        self.logger.info(format!("running cron task '{}' ({})", task.title, task.callable_ref));
        let ctx = TaskContext {
            task: task.clone(),
            now,
            logger: self.logger.clone(),
        };

        // Spawned so a panicking callable surfaces as a JoinError.
        match tokio::spawn(callable(ctx)).await {
            Ok(Ok(())) => Ok(true),
            Ok(Err(e)) => Err(failure(FailureKind::Callable, e.to_string())),
            Err(e) => Err(failure(FailureKind::Panicked, e.to_string())),
        }
    }

    /// Compare the latest run log against `max_age`.
    pub async fn heartbeat_status(&self, max_age: TimeDelta) -> CronResult<HeartbeatStatus> {
        let now = self.clock.utc();
        let status = match self.logs.latest().await? {
            None => HeartbeatStatus::Missing,
            Some(log) => {
                let age = now - log.run_time;
                if age <= max_age {
                    HeartbeatStatus::Alive {
                        last_run: log.run_time,
                    }
                } else {
                    HeartbeatStatus::Stale {
                        last_run: log.run_time,
                        age,
                    }
                }
            }
        };
        Ok(status)
    }
}
