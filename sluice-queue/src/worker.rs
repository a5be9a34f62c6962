//! Worker contract and registry.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::error::{QueueError, QueueResult};
use crate::message::Message;

/// Result type for worker execution.
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors raised by workers.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Payload does not have the shape the worker expects
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Mail collaborator failed
    #[error("Mail error: {0}")]
    Mail(#[from] sluice_mail::MailError),

    /// Any other collaborator failed
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// Worker gave up
    #[error("{0}")]
    Failed(String),
}

impl From<serde_json::Error> for WorkerError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidPayload(err.to_string())
    }
}

/// A handler for one kind of message.
///
/// The returned value is interpreted for truthiness: a truthy value ends
/// the message `ended_ok`, a falsy one `ended_ko`.
#[async_trait]
pub trait Worker: Send + Sync {
    async fn process_message(&self, message: &Message) -> WorkerResult<Value>;
}

/// Builds a worker for a message.
pub type WorkerFactory = Arc<dyn Fn() -> Arc<dyn Worker> + Send + Sync>;

/// Maps stable string keys to worker factories.
#[derive(Clone, Default)]
pub struct WorkerRegistry {
    factories: HashMap<String, WorkerFactory>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `key`, replacing any previous one.
    ///
    /// ```
    /// use sluice_queue::{WorkerRegistry, workers::TestWorker};
    /// use std::sync::Arc;
    ///
    /// let mut registry = WorkerRegistry::new();
    /// registry.register(TestWorker::KEY, || Arc::new(TestWorker));
    /// assert!(registry.contains("test"));
    /// ```
    pub fn register<F>(&mut self, key: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn Worker> + Send + Sync + 'static,
    {
        self.factories.insert(key.into(), Arc::new(factory));
        self
    }

    /// Register a shared instance under `key`.
    pub fn register_instance(&mut self, key: impl Into<String>, worker: Arc<dyn Worker>) -> &mut Self {
        self.register(key, move || Arc::clone(&worker))
    }

    /// Build the worker for `key`.
    pub fn resolve(&self, key: &str) -> QueueResult<Arc<dyn Worker>> {
        self.factories
            .get(key)
            .map(|factory| factory())
            .ok_or_else(|| QueueError::UnknownWorker(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}
