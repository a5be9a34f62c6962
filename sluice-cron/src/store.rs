//! Task and run-log persistence.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{CronError, CronResult};
use crate::task::{CronLog, CronTask};

/// Storage for task definitions.
#[async_trait]
pub trait CronTaskStore: Send + Sync {
    /// Persist a task and return it with its assigned id.
    async fn add(&self, task: CronTask) -> CronResult<CronTask>;

    /// Every task, in store order.
    async fn list(&self) -> CronResult<Vec<CronTask>>;

    /// Active tasks with a schedule expression, in store order.
    async fn active_scheduled(&self) -> CronResult<Vec<CronTask>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(CronTask::is_schedulable)
            .collect())
    }

    async fn set_active(&self, id: i64, active: bool) -> CronResult<()>;
}

/// Append-only storage for run logs.
#[async_trait]
pub trait CronLogStore: Send + Sync {
    async fn append(&self, log: CronLog) -> CronResult<CronLog>;

    /// Most recent log by run time.
    async fn latest(&self) -> CronResult<Option<CronLog>>;

    /// Up to `limit` logs, newest first.
    async fn recent(&self, limit: usize) -> CronResult<Vec<CronLog>>;
}

#[derive(Default)]
struct MemoryState {
    tasks: Vec<CronTask>,
    logs: Vec<CronLog>,
}

/// In-process task and log store.
#[derive(Default)]
pub struct InMemoryCronStore {
    state: RwLock<MemoryState>,
}

impl InMemoryCronStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CronTaskStore for InMemoryCronStore {
    async fn add(&self, mut task: CronTask) -> CronResult<CronTask> {
        let mut state = self.state.write().await;
        task.id = state.tasks.last().map_or(1, |t| t.id + 1);
        state.tasks.push(task.clone());
        Ok(task)
    }

    async fn list(&self) -> CronResult<Vec<CronTask>> {
        Ok(self.state.read().await.tasks.clone())
    }

    async fn set_active(&self, id: i64, active: bool) -> CronResult<()> {
        let mut state = self.state.write().await;
        let task = state
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(CronError::TaskNotFound(id))?;
        task.active = active;
        Ok(())
    }
}

#[async_trait]
impl CronLogStore for InMemoryCronStore {
    async fn append(&self, mut log: CronLog) -> CronResult<CronLog> {
        let mut state = self.state.write().await;
        log.id = state.logs.last().map_or(1, |l| l.id + 1);
        state.logs.push(log.clone());
        Ok(log)
    }

    async fn latest(&self) -> CronResult<Option<CronLog>> {
        let state = self.state.read().await;
        Ok(state.logs.iter().max_by_key(|l| (l.run_time, l.id)).cloned())
    }

    async fn recent(&self, limit: usize) -> CronResult<Vec<CronLog>> {
        let state = self.state.read().await;
        let mut logs = state.logs.clone();
        logs.sort_by(|a, b| (b.run_time, b.id).cmp(&(a.run_time, a.id)));
        logs.truncate(limit);
        Ok(logs)
    }
}
