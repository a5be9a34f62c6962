//! The queue dispatcher loop.

use serde_json::Value;
use sluice_log::Logger;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::control::{KillSentinel, ProcessLock};
use crate::error::{QueueError, QueueResult};
use crate::message::{Message, MessageId, MessageResult};
use crate::process::process;
use crate::store::MessageStore;
use crate::worker::WorkerRegistry;

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Queue to drain; every queue when `None`
    pub queue_name: Option<String>,
    /// Directory holding the lock file and the sentinel
    pub runtime_dir: PathBuf,
    pub lock_file: String,
    pub kill_file: String,
    /// Tick cap per run
    pub max_executions: u64,
    /// Pause after each tick
    pub sleep_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_name: None,
            runtime_dir: std::env::temp_dir().join("sluice"),
            lock_file: "queue.lock".to_string(),
            kill_file: "queue.kill".to_string(),
            max_executions: 100_000,
            sleep_interval: Duration::from_millis(500),
        }
    }
}

impl DispatcherConfig {
    pub fn new(runtime_dir: impl Into<PathBuf>) -> Self {
        Self {
            runtime_dir: runtime_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_queue(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = Some(queue_name.into());
        self
    }

    pub fn with_max_executions(mut self, max_executions: u64) -> Self {
        self.max_executions = max_executions;
        self
    }

    pub fn with_sleep_interval(mut self, sleep_interval: Duration) -> Self {
        self.sleep_interval = sleep_interval;
        self
    }

    pub fn with_lock_file(mut self, lock_file: impl Into<String>) -> Self {
        self.lock_file = lock_file.into();
        self
    }

    pub fn with_kill_file(mut self, kill_file: impl Into<String>) -> Self {
        self.kill_file = kill_file.into();
        self
    }

    pub fn lock_path(&self) -> PathBuf {
        self.runtime_dir.join(&self.lock_file)
    }

    pub fn kill_path(&self) -> PathBuf {
        self.runtime_dir.join(&self.kill_file)
    }

    pub fn sentinel(&self) -> KillSentinel {
        KillSentinel::new(self.kill_path())
    }

    fn validate(&self) -> QueueResult<()> {
        if self.max_executions == 0 {
            return Err(QueueError::Config("max_executions must be at least 1".to_string()));
        }
        if self.lock_file == self.kill_file {
            return Err(QueueError::Config(
                "lock file and kill file must differ".to_string(),
            ));
        }
        Ok(())
    }
}

/// Lifecycle of a dispatcher run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Idle,
    AcquiringLock,
    Running,
    Stopping,
    Exited,
}

impl fmt::Display for DispatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::AcquiringLock => "acquiring_lock",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Exited => "exited",
        };
        f.write_str(name)
    }
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No pending message
    Idle,
    /// A worker ran and its result was written
    Processed {
        id: MessageId,
        result: MessageResult,
        value: Value,
    },
    /// No worker for the message's key; the message stays pending
    Unresolved { id: MessageId, worker_class: String },
    /// The tick failed; the loop carries on
    Failed {
        id: Option<MessageId>,
        error: String,
    },
    /// The kill-sentinel was seen
    Stopped,
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    ExecutionCap,
    KillSentinel,
}

/// Totals for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub ticks: u64,
    pub processed: u64,
    pub ended_ok: u64,
    pub ended_ko: u64,
    pub unresolved: u64,
    pub failed: u64,
}

impl RunStats {
    fn record(&mut self, outcome: &TickOutcome) {
        self.ticks += 1;
        match outcome {
            TickOutcome::Processed { result, .. } => {
                self.processed += 1;
                if result.is_ok() {
                    self.ended_ok += 1;
                } else {
                    self.ended_ko += 1;
                }
            }
            TickOutcome::Unresolved { .. } => self.unresolved += 1,
            TickOutcome::Failed { .. } => self.failed += 1,
            TickOutcome::Idle | TickOutcome::Stopped => {}
        }
    }
}

/// Single-process polling loop that drains a queue.
pub struct Dispatcher {
    store: Arc<dyn MessageStore>,
    registry: Arc<WorkerRegistry>,
    logger: Logger,
    config: DispatcherConfig,
    sentinel: KillSentinel,
    state: DispatcherState,
    unresolved: HashSet<MessageId>,
    stats: RunStats,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn MessageStore>,
        registry: Arc<WorkerRegistry>,
        logger: Logger,
        config: DispatcherConfig,
    ) -> Self {
        let sentinel = config.sentinel();
        Self {
            store,
            registry,
            logger,
            config,
            sentinel,
            state: DispatcherState::Idle,
            unresolved: HashSet::new(),
            stats: RunStats::default(),
        }
    }

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Totals of the last (or current) run.
    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn lock_path(&self) -> PathBuf {
        self.config.lock_path()
    }

    pub fn kill_path(&self) -> &Path {
        self.sentinel.path()
    }

    fn transition(&mut self, state: DispatcherState) {
        self.logger
            .debug(format!("dispatcher state {} -> {}", self.state, state));
        self.state = state;
    }

    /// Run until the execution cap or the kill-sentinel.
    ///
    /// Fails fast with [`QueueError::LockHeld`] when another dispatcher owns
    /// the lock; nothing is processed in that case.
    pub async fn run(&mut self) -> QueueResult<ExitReason> {
        self.config.validate()?;
        self.unresolved.clear();
        self.stats = RunStats::default();

        self.transition(DispatcherState::AcquiringLock);
        let lock = match ProcessLock::acquire(self.config.lock_path()) {
            Ok(lock) => lock,
            Err(err) => {
                match &err {
                    QueueError::LockHeld(path) => self.logger.warn(format!(
                        "queue already being processed, lock held at {}",
                        path.display()
                    )),
                    other => self.logger.error(format!("cannot take queue lock: {}", other)),
                }
                self.transition(DispatcherState::Exited);
                return Err(err);
            }
        };

        match self.sentinel.clear() {
            Ok(true) => self.logger.info(format!(
                "removed stale kill sentinel {}",
                self.sentinel.path().display()
            )),
            Ok(false) => {}
            Err(err) => {
                self.logger.error(format!(
                    "cannot remove stale kill sentinel {}: {}",
                    self.sentinel.path().display(),
                    err
                ));
                self.transition(DispatcherState::Exited);
                return Err(err.into());
            }
        }

        self.transition(DispatcherState::Running);
        self.logger.info(format!(
            "processing queue {} (max {} executions, sleep {:?})",
            self.config.queue_name.as_deref().unwrap_or("*"),
            self.config.max_executions,
            self.config.sleep_interval
        ));

        let mut reason = ExitReason::ExecutionCap;
        for _ in 0..self.config.max_executions {
            let outcome = self.tick().await;
            self.stats.record(&outcome);

            if outcome == TickOutcome::Stopped {
                reason = ExitReason::KillSentinel;
                break;
            }

            tokio::time::sleep(self.config.sleep_interval).await;
        }

        self.transition(DispatcherState::Stopping);
        drop(lock);
        self.transition(DispatcherState::Exited);

        self.logger.info(format!(
            "dispatcher exited ({:?}): {} ticks, {} processed, {} unresolved, {} failed",
            reason,
            self.stats.ticks,
            self.stats.processed,
            self.stats.unresolved,
            self.stats.failed
        ));
        Ok(reason)
    }

    /// Perform one tick without sleeping.
    ///
    /// Errors never escape a tick: they are logged and reported as
    /// [`TickOutcome::Failed`].
    pub async fn tick(&mut self) -> TickOutcome {
        if self.sentinel.is_present() {
            self.logger.critical(format!(
                "kill sentinel detected at {}, stopping",
                self.sentinel.path().display()
            ));
            return TickOutcome::Stopped;
        }

        let skip: Vec<MessageId> = self.unresolved.iter().copied().collect();
        let claimed = self
            .store
            .next_message_excluding(self.config.queue_name.as_deref(), &skip)
            .await;

        let mut message = match claimed {
            Ok(Some(message)) => message,
            Ok(None) => return TickOutcome::Idle,
            Err(err) => {
                self.logger
                    .error(format!("cannot read next message: {}", err));
                return TickOutcome::Failed {
                    id: None,
                    error: err.to_string(),
                };
            }
        };

        let worker = match self.registry.resolve(&message.worker_class) {
            Ok(worker) => worker,
            Err(err) => {
                self.logger.error(format!(
                    "message {}: {}; leaving it pending",
                    message.id, err
                ));
                self.unresolved.insert(message.id);
                return TickOutcome::Unresolved {
                    id: message.id,
                    worker_class: message.worker_class,
                };
            }
        };

        self.logger.debug(format!(
            "message {} -> worker {}",
            message.id, message.worker_class
        ));

        let id = message.id;
        let store = Arc::clone(&self.store);
        let claimed = message.clone();
        // Spawned so a panicking worker surfaces as a JoinError.
        let joined = tokio::spawn(async move {
            let outcome = process(worker.as_ref(), store.as_ref(), &mut message).await;
            (message, outcome)
        })
        .await;

        let (message, outcome) = match joined {
            Ok(done) => done,
            Err(err) => return self.worker_panicked(claimed, err.to_string()).await,
        };

        match outcome {
            Ok(value) => {
                let result = message
                    .result
                    .unwrap_or_else(|| MessageResult::from_value(&value));
                self.logger
                    .info(format!("message {} {}", message.id, result));
                TickOutcome::Processed {
                    id: message.id,
                    result,
                    value,
                }
            }
            Err(err) => {
                self.logger
                    .error(format!("message {} failed: {}", message.id, err));
                TickOutcome::Failed {
                    id: Some(id),
                    error: err.to_string(),
                }
            }
        }
    }

    async fn worker_panicked(&self, mut message: Message, error: String) -> TickOutcome {
        self.logger.error(format!(
            "message {} worker {} panicked: {}",
            message.id, message.worker_class, error
        ));
        if let Err(err) = self
            .store
            .mark_result(&mut message, MessageResult::EndedKo)
            .await
        {
            self.logger.error(format!(
                "cannot mark message {} as ended_ko: {}",
                message.id, err
            ));
        }
        TickOutcome::Failed {
            id: Some(message.id),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryMessageStore;
    use crate::worker::{Worker, WorkerResult};
    use crate::workers::TestWorker;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use serde_json::json;
    use sluice_log::{Level, MemorySink};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Panicky;

    #[async_trait]
    impl Worker for Panicky {
        async fn process_message(&self, message: &Message) -> WorkerResult<Value> {
            if message.worker_class == "panicky" {
                panic!("worker blew up on message {}", message.id);
            }
            Ok(json!(true))
        }
    }

    /// Wraps the memory store and fails the next N reads or writes.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryMessageStore,
        failing_reads: AtomicUsize,
        failing_marks: AtomicUsize,
    }

    impl FlakyStore {
        fn trip(counter: &AtomicUsize) -> QueueResult<()> {
            let tripped = counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if tripped {
                Err(QueueError::Store("database is locked".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl MessageStore for FlakyStore {
        async fn enqueue(
            &self,
            queue_name: &str,
            worker_class: &str,
            payload: Value,
        ) -> QueueResult<Message> {
            self.inner.enqueue(queue_name, worker_class, payload).await
        }

        async fn next_message_excluding(
            &self,
            queue_name: Option<&str>,
            skip: &[MessageId],
        ) -> QueueResult<Option<Message>> {
            Self::trip(&self.failing_reads)?;
            self.inner.next_message_excluding(queue_name, skip).await
        }

        async fn mark_result(&self, message: &mut Message, result: MessageResult) -> QueueResult<()> {
            Self::trip(&self.failing_marks)?;
            self.inner.mark_result(message, result).await
        }

        async fn get(&self, id: MessageId) -> QueueResult<Option<Message>> {
            self.inner.get(id).await
        }

        async fn count_pending(&self, queue_name: Option<&str>) -> QueueResult<u64> {
            self.inner.count_pending(queue_name).await
        }

        async fn purge_processed(&self, older_than: DateTime<Utc>) -> QueueResult<u64> {
            self.inner.purge_processed(older_than).await
        }
    }

    fn flaky_dispatcher(dir: &Path, store: Arc<FlakyStore>) -> (Dispatcher, MemorySink) {
        let mut registry = WorkerRegistry::new();
        registry.register(TestWorker::KEY, || Arc::new(TestWorker));
        let sink = MemorySink::new();
        let logger = Logger::with_sink("sluice::dispatcher", Arc::new(sink.clone()));
        let config = DispatcherConfig::new(dir).with_sleep_interval(Duration::ZERO);
        (
            Dispatcher::new(store, Arc::new(registry), logger, config),
            sink,
        )
    }

    fn dispatcher(dir: &Path, store: Arc<InMemoryMessageStore>) -> (Dispatcher, MemorySink) {
        let mut registry = WorkerRegistry::new();
        registry.register(TestWorker::KEY, || Arc::new(TestWorker));
        let sink = MemorySink::new();
        let logger = Logger::with_sink("sluice::dispatcher", Arc::new(sink.clone()));
        let config = DispatcherConfig::new(dir)
            .with_max_executions(10)
            .with_sleep_interval(Duration::ZERO);
        (
            Dispatcher::new(store, Arc::new(registry), logger, config),
            sink,
        )
    }

    #[test]
    fn test_config_defaults() {
        let config = DispatcherConfig::default();
        assert_eq!(config.max_executions, 100_000);
        assert_eq!(config.sleep_interval, Duration::from_millis(500));
        assert!(config.lock_path().ends_with("queue.lock"));
        assert!(config.kill_path().ends_with("queue.kill"));
    }

    #[tokio::test]
    async fn test_tick_idle() {
        let dir = tempfile::tempdir().unwrap();
        let (mut dispatcher, _) = dispatcher(dir.path(), Arc::new(InMemoryMessageStore::new()));
        assert_eq!(dispatcher.tick().await, TickOutcome::Idle);
    }

    #[tokio::test]
    async fn test_tick_processes_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryMessageStore::new());
        let first = store.enqueue("q", "test", json!({"result": 0})).await.unwrap();
        store.enqueue("q", "test", json!({})).await.unwrap();
        let (mut dispatcher, _) = dispatcher(dir.path(), Arc::clone(&store));

        match dispatcher.tick().await {
            TickOutcome::Processed { id, result, .. } => {
                assert_eq!(id, first.id);
                assert_eq!(result, MessageResult::EndedKo);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tick_stops_on_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryMessageStore::new());
        store.enqueue("q", "test", json!({})).await.unwrap();
        let (mut dispatcher, sink) = dispatcher(dir.path(), Arc::clone(&store));

        dispatcher.config().sentinel().signal().unwrap();

        assert_eq!(dispatcher.tick().await, TickOutcome::Stopped);
        assert_eq!(store.count_pending(None).await.unwrap(), 1);
        assert!(sink.contains(Level::Critical, "kill sentinel"));
    }

    #[tokio::test]
    async fn test_unknown_worker_is_skipped_for_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryMessageStore::new());
        let orphan = store.enqueue("q", "Legacy\\Worker", json!({})).await.unwrap();
        let next = store.enqueue("q", "test", json!({})).await.unwrap();
        let (mut dispatcher, sink) = dispatcher(dir.path(), Arc::clone(&store));

        assert_eq!(
            dispatcher.tick().await,
            TickOutcome::Unresolved {
                id: orphan.id,
                worker_class: "Legacy\\Worker".to_string()
            }
        );
        assert!(matches!(
            dispatcher.tick().await,
            TickOutcome::Processed { id, .. } if id == next.id
        ));
        assert_eq!(dispatcher.tick().await, TickOutcome::Idle);

        let orphan = store.get(orphan.id).await.unwrap().unwrap();
        assert!(orphan.is_pending());
        assert!(sink.contains(Level::Error, "Legacy\\Worker"));
    }

    #[tokio::test]
    async fn test_run_rejects_zero_cap() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryMessageStore::new());
        let mut registry = WorkerRegistry::new();
        registry.register(TestWorker::KEY, || Arc::new(TestWorker));
        let mut dispatcher = Dispatcher::new(
            store,
            Arc::new(registry),
            Logger::default(),
            DispatcherConfig::new(dir.path()).with_max_executions(0),
        );

        assert!(matches!(dispatcher.run().await, Err(QueueError::Config(_))));
    }

    #[tokio::test]
    async fn test_run_stats() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryMessageStore::new());
        store.enqueue("q", "test", json!({})).await.unwrap();
        store.enqueue("q", "test", json!({"result": false})).await.unwrap();
        store.enqueue("q", "missing", json!({})).await.unwrap();
        let (mut dispatcher, _) = dispatcher(dir.path(), store);

        let reason = dispatcher.run().await.unwrap();

        assert_eq!(reason, ExitReason::ExecutionCap);
        assert_eq!(dispatcher.state(), DispatcherState::Exited);
        let stats = dispatcher.stats();
        assert_eq!(stats.ticks, 10);
        assert_eq!(stats.ended_ok, 1);
        assert_eq!(stats.ended_ko, 1);
        assert_eq!(stats.unresolved, 1);
    }

    #[tokio::test]
    async fn test_panicking_worker_ends_ko_and_run_continues() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryMessageStore::new());
        let bad = store.enqueue("q", "panicky", json!({})).await.unwrap();
        let good = store.enqueue("q", "test", json!({})).await.unwrap();

        let mut registry = WorkerRegistry::new();
        registry.register("panicky", || Arc::new(Panicky));
        registry.register(TestWorker::KEY, || Arc::new(TestWorker));
        let sink = MemorySink::new();
        let mut dispatcher = Dispatcher::new(
            store.clone(),
            Arc::new(registry),
            Logger::with_sink("sluice::dispatcher", Arc::new(sink.clone())),
            DispatcherConfig::new(dir.path())
                .with_max_executions(5)
                .with_sleep_interval(Duration::ZERO),
        );

        assert_eq!(dispatcher.run().await.unwrap(), ExitReason::ExecutionCap);

        let bad = store.get(bad.id).await.unwrap().unwrap();
        assert_eq!(bad.result, Some(MessageResult::EndedKo));
        let good = store.get(good.id).await.unwrap().unwrap();
        assert_eq!(good.result, Some(MessageResult::EndedOk));
        assert_eq!(store.count_pending(None).await.unwrap(), 0);

        let stats = dispatcher.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.ended_ok, 1);
        assert!(sink.contains(Level::Error, "panicked"));
    }

    #[tokio::test]
    async fn test_store_read_error_fails_tick_then_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FlakyStore::default());
        let message = store.enqueue("q", "test", json!({})).await.unwrap();
        store.failing_reads.store(1, Ordering::SeqCst);
        let (mut dispatcher, sink) = flaky_dispatcher(dir.path(), store.clone());

        assert!(matches!(
            dispatcher.tick().await,
            TickOutcome::Failed { id: None, ref error } if error.contains("database is locked")
        ));
        assert!(sink.contains(Level::Error, "cannot read next message"));
        assert_eq!(store.count_pending(None).await.unwrap(), 1);

        assert!(matches!(
            dispatcher.tick().await,
            TickOutcome::Processed { id, result: MessageResult::EndedOk, .. } if id == message.id
        ));
        assert_eq!(dispatcher.tick().await, TickOutcome::Idle);
    }

    #[tokio::test]
    async fn test_mark_failure_leaves_message_pending_for_next_tick() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FlakyStore::default());
        let message = store.enqueue("q", "test", json!({})).await.unwrap();
        store.failing_marks.store(1, Ordering::SeqCst);
        let (mut dispatcher, sink) = flaky_dispatcher(dir.path(), store.clone());

        assert_eq!(
            dispatcher.tick().await,
            TickOutcome::Failed {
                id: Some(message.id),
                error: "Message store error: database is locked".to_string(),
            }
        );
        assert!(sink.contains(Level::Error, &format!("message {} failed", message.id)));
        assert!(store.get(message.id).await.unwrap().unwrap().is_pending());

        assert!(matches!(
            dispatcher.tick().await,
            TickOutcome::Processed { id, .. } if id == message.id
        ));
        assert_eq!(store.count_pending(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_exits_when_stale_sentinel_cannot_be_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryMessageStore::new());
        store.enqueue("q", "test", json!({})).await.unwrap();
        let (mut dispatcher, sink) = dispatcher(dir.path(), store.clone());
        std::fs::create_dir_all(dispatcher.kill_path().join("busy")).unwrap();

        assert!(matches!(dispatcher.run().await, Err(QueueError::Io(_))));
        assert_eq!(dispatcher.state(), DispatcherState::Exited);
        assert!(sink.contains(Level::Error, "cannot remove stale kill sentinel"));
        assert_eq!(store.count_pending(None).await.unwrap(), 1);
        assert!(ProcessLock::acquire(dispatcher.lock_path()).is_ok());
    }
}
