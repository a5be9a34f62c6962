//! Named callables that cron tasks refer to.

use chrono::{DateTime, TimeDelta, Utc};
use sluice_log::Logger;
use sluice_queue::MessageStore;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{CronError, CronResult};
use crate::task::CronTask;

/// Callable behind [`CronTask::heartbeat`].
pub const HEARTBEAT_PULSE: &str = "heartbeat_pulse";

/// Conventional name for the processed-message purge.
pub const QUEUE_PURGE: &str = "queue_purge";

/// Callable function type.
pub type CallableFn =
    Arc<dyn Fn(TaskContext) -> Pin<Box<dyn Future<Output = CronResult<()>> + Send>> + Send + Sync>;

/// What a callable is told about the run.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// The task being run
    pub task: CronTask,

    /// Clock reading at the start of the tick
    pub now: DateTime<Utc>,

    /// Logger scoped to the scheduler
    pub logger: Logger,
}

/// String-keyed callable lookup.
#[derive(Clone, Default)]
pub struct CallableRegistry {
    callables: HashMap<String, CallableFn>,
}

impl CallableRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `heartbeat_pulse` already registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(HEARTBEAT_PULSE, |ctx: TaskContext| async move {
            ctx.logger.debug(format!("heartbeat pulse at {}", ctx.now.to_rfc3339()));
            Ok(())
        });
        registry
    }

    /// Register `callable` under `name`, replacing any previous entry.
    ///
    /// # Examples
    ///
    /// ```
    /// use sluice_cron::CallableRegistry;
    ///
    /// let mut registry = CallableRegistry::new();
    /// registry.register("Maintenance::cleanup", |ctx| async move {
    ///     ctx.logger.info("cleaning up");
    ///     Ok(())
    /// });
    /// assert!(registry.contains("Maintenance::cleanup"));
    /// ```
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, callable: F) -> &mut Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CronResult<()>> + Send + 'static,
    {
        let callable: CallableFn = Arc::new(move |ctx| Box::pin(callable(ctx)));
        self.callables.insert(name.into(), callable);
        self
    }

    /// Register a purge of processed messages older than `retention`.
    pub fn register_queue_purge(
        &mut self,
        name: impl Into<String>,
        store: Arc<dyn MessageStore>,
        retention: TimeDelta,
    ) -> &mut Self {
        self.register(name, move |ctx: TaskContext| {
            let store = store.clone();
            async move {
                let purged = store.purge_processed(ctx.now - retention).await?;
                ctx.logger.info(format!("purged {} processed message(s)", purged));
                Ok(())
            }
        })
    }

    pub fn resolve(&self, name: &str) -> CronResult<CallableFn> {
        self.callables
            .get(name)
            .cloned()
            .ok_or_else(|| CronError::UnknownCallable(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.callables.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.callables.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for CallableRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallableRegistry")
            .field("callables", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sluice_log::{Level, MemorySink};
    use sluice_queue::{InMemoryMessageStore, MessageResult};

    fn context(sink: &MemorySink) -> TaskContext {
        TaskContext {
            task: CronTask::heartbeat(),
            now: Utc::now(),
            logger: Logger::with_sink("sluice::cron", Arc::new(sink.clone())),
        }
    }

    #[tokio::test]
    async fn test_builtin_heartbeat() {
        let registry = CallableRegistry::with_builtins();
        assert_eq!(registry.names(), vec![HEARTBEAT_PULSE.to_string()]);

        let sink = MemorySink::new();
        let pulse = registry.resolve(HEARTBEAT_PULSE).unwrap();
        pulse(context(&sink)).await.unwrap();
        assert!(sink.contains(Level::Debug, "heartbeat pulse"));
    }

    #[test]
    fn test_unknown_callable() {
        let registry = CallableRegistry::new();
        assert!(matches!(
            registry.resolve("Missing::call"),
            Err(CronError::UnknownCallable(name)) if name == "Missing::call"
        ));
    }

    #[tokio::test]
    async fn test_register_replaces() {
        let mut registry = CallableRegistry::new();
        registry.register("job", |_| async { Err(CronError::ExecutionFailed("old".into())) });
        registry.register("job", |_| async { Ok(()) });

        let sink = MemorySink::new();
        assert!(registry.resolve("job").unwrap()(context(&sink)).await.is_ok());
        assert_eq!(registry.names().len(), 1);
    }

    #[tokio::test]
    async fn test_queue_purge() {
        let store = Arc::new(InMemoryMessageStore::new());
        let mut done = store.enqueue("q", "test", json!({})).await.unwrap();
        store.enqueue("q", "test", json!({})).await.unwrap();
        store.mark_result(&mut done, MessageResult::EndedOk).await.unwrap();

        let mut registry = CallableRegistry::new();
        registry.register_queue_purge(QUEUE_PURGE, store.clone(), TimeDelta::zero());

        let sink = MemorySink::new();
        let mut ctx = context(&sink);
        ctx.now = Utc::now() + TimeDelta::seconds(1);
        registry.resolve(QUEUE_PURGE).unwrap()(ctx).await.unwrap();

        assert_eq!(store.all().await.len(), 1);
        assert!(sink.contains(Level::Info, "purged 1"));
    }
}
