//! Error types for cron operations.

use thiserror::Error;

/// Result type for cron operations.
pub type CronResult<T> = Result<T, CronError>;

/// Cron-specific errors.
#[derive(Debug, Error)]
pub enum CronError {
    /// Invalid cron expression
    #[error("Invalid cron expression: {0}")]
    InvalidExpression(String),

    /// No callable registered under the reference
    #[error("No callable registered for: {0}")]
    UnknownCallable(String),

    /// Task not found
    #[error("Cron task not found: {0}")]
    TaskNotFound(i64),

    /// A callable returned an error
    #[error("Task execution failed: {0}")]
    ExecutionFailed(String),

    /// Task or log store error
    #[error("Cron store error: {0}")]
    Store(String),

    /// Database error
    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Queue error raised by a maintenance task
    #[error("Queue error: {0}")]
    Queue(#[from] sluice_queue::QueueError),
}
