//! Error types for queue operations.

use crate::message::MessageId;
use crate::worker::WorkerError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Queue-specific errors.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Database error
    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Store unavailable or inconsistent
    #[error("Message store error: {0}")]
    Store(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Message not found
    #[error("Message not found: {0}")]
    MessageNotFound(MessageId),

    /// Terminal state is never overwritten
    #[error("Message {0} is already processed")]
    AlreadyProcessed(MessageId),

    /// No worker registered under the key
    #[error("No worker registered for key: {0}")]
    UnknownWorker(String),

    /// Worker raised an error
    #[error("Worker failed: {0}")]
    Worker(#[from] WorkerError),

    /// Another dispatcher holds the lock
    #[error("Queue lock is held by another process: {}", .0.display())]
    LockHeld(PathBuf),

    /// Filesystem error on the lock or the sentinel
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl QueueError {
    /// Whether the error comes from the persistence layer.
    pub fn is_store_error(&self) -> bool {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Database(_) => true,
            Self::Store(_) => true,
            _ => false,
        }
    }
}
