//! Durable message queue and dispatcher loop.
//!
//! Producers persist [`Message`]s through a [`MessageStore`]. A single
//! [`Dispatcher`] per queue claims the oldest pending message, resolves its
//! worker from a [`WorkerRegistry`] by key, runs it and writes back
//! `ended_ok` or `ended_ko` from the truthiness of the worker's value.
//!
//! Only one dispatcher may run per runtime directory: it holds an exclusive
//! lock file for the whole run and fails fast when the lock is taken. It stops
//! when the execution cap is reached or when the kill-sentinel file appears.
//!
//! ## Enqueue and drain
//!
//! ```
//! use sluice_log::Logger;
//! use sluice_queue::prelude::*;
//! use sluice_queue::workers::TestWorker;
//! use serde_json::json;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> QueueResult<()> {
//! let store = Arc::new(InMemoryMessageStore::new());
//! store.enqueue("default", TestWorker::KEY, json!({"result": true})).await?;
//!
//! let mut registry = WorkerRegistry::new();
//! registry.register(TestWorker::KEY, || Arc::new(TestWorker));
//!
//! let runtime = std::env::temp_dir().join("sluice-doc");
//! let config = DispatcherConfig::new(runtime)
//!     .with_queue("default")
//!     .with_max_executions(2)
//!     .with_sleep_interval(Duration::ZERO);
//!
//! let mut dispatcher = Dispatcher::new(store.clone(), Arc::new(registry), Logger::default(), config);
//! let reason = dispatcher.run().await?;
//!
//! assert_eq!(reason, ExitReason::ExecutionCap);
//! assert_eq!(store.count_pending(None).await?, 0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Stopping a running dispatcher
//!
//! Create the kill file (see [`KillSentinel::signal`]); the loop notices it
//! at the start of its next tick. A leftover sentinel is removed when the
//! next run starts.

pub mod control;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod process;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod store;
pub mod worker;
pub mod workers;

pub use control::{KillSentinel, ProcessLock};
pub use dispatcher::{
    Dispatcher, DispatcherConfig, DispatcherState, ExitReason, RunStats, TickOutcome,
};
pub use error::{QueueError, QueueResult};
pub use message::{Message, MessageId, MessageResult, MessageStatus, Payload};
pub use process::{is_truthy, process};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteMessageStore, connect_pool};
pub use store::{InMemoryMessageStore, MessageStore};
pub use worker::{Worker, WorkerError, WorkerFactory, WorkerRegistry, WorkerResult};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::control::{KillSentinel, ProcessLock};
    pub use crate::dispatcher::{Dispatcher, DispatcherConfig, ExitReason, TickOutcome};
    pub use crate::error::{QueueError, QueueResult};
    pub use crate::message::{Message, MessageId, MessageResult, MessageStatus};
    pub use crate::store::{InMemoryMessageStore, MessageStore};
    pub use crate::worker::{Worker, WorkerError, WorkerRegistry, WorkerResult};
}
