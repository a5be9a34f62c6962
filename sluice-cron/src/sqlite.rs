//! SQLite-backed task and log stores.

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

use crate::error::{CronError, CronResult};
use crate::store::{CronLogStore, CronTaskStore};
use crate::task::{CronLog, CronTask};

/// Tasks live in `cron_tasks`, logs in `cron_logs`.
///
/// The pool may be shared with the message store; both schemas coexist in
/// one database.
pub struct SqliteCronStore {
    pool: SqlitePool,
}

impl SqliteCronStore {
    /// Wrap an existing pool and create the tables if needed.
    pub async fn new(pool: SqlitePool) -> CronResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub async fn connect(database_url: &str) -> CronResult<Self> {
        Self::new(sluice_queue::connect_pool(database_url).await?).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(&self) -> CronResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cron_tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                schedule_expression TEXT,
                callable_ref TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cron_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_time TEXT NOT NULL,
                tasks_executed TEXT NOT NULL,
                duration REAL NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_task(row: &SqliteRow) -> CronResult<CronTask> {
        Ok(CronTask {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            schedule_expression: row.try_get("schedule_expression")?,
            callable_ref: row.try_get("callable_ref")?,
            active: row.try_get("active")?,
        })
    }

    fn row_to_log(row: &SqliteRow) -> CronResult<CronLog> {
        Ok(CronLog {
            id: row.try_get("id")?,
            run_time: row.try_get("run_time")?,
            tasks_executed: row.try_get("tasks_executed")?,
            duration: row.try_get("duration")?,
        })
    }
}

#[async_trait]
impl CronTaskStore for SqliteCronStore {
    async fn add(&self, task: CronTask) -> CronResult<CronTask> {
        let row = sqlx::query(
            "INSERT INTO cron_tasks (title, schedule_expression, callable_ref, active) \
             VALUES (?1, ?2, ?3, ?4) \
             RETURNING id, title, schedule_expression, callable_ref, active",
        )
        .bind(&task.title)
        .bind(&task.schedule_expression)
        .bind(&task.callable_ref)
        .bind(task.active)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_task(&row)
    }

    async fn list(&self) -> CronResult<Vec<CronTask>> {
        let rows = sqlx::query(
            "SELECT id, title, schedule_expression, callable_ref, active \
             FROM cron_tasks ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_task).collect()
    }

    async fn active_scheduled(&self) -> CronResult<Vec<CronTask>> {
        let rows = sqlx::query(
            "SELECT id, title, schedule_expression, callable_ref, active \
             FROM cron_tasks \
             WHERE active = 1 AND schedule_expression IS NOT NULL \
             AND TRIM(schedule_expression) <> '' \
             ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_task).collect()
    }

    async fn set_active(&self, id: i64, active: bool) -> CronResult<()> {
        let updated = sqlx::query("UPDATE cron_tasks SET active = ?2 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await?;

        if updated.rows_affected() == 0 {
            return Err(CronError::TaskNotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl CronLogStore for SqliteCronStore {
    async fn append(&self, log: CronLog) -> CronResult<CronLog> {
        let row = sqlx::query(
            "INSERT INTO cron_logs (run_time, tasks_executed, duration) VALUES (?1, ?2, ?3) \
             RETURNING id, run_time, tasks_executed, duration",
        )
        .bind(log.run_time)
        .bind(&log.tasks_executed)
        .bind(log.duration)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_log(&row)
    }

    async fn latest(&self) -> CronResult<Option<CronLog>> {
        Ok(self.recent(1).await?.into_iter().next())
    }

    async fn recent(&self, limit: usize) -> CronResult<Vec<CronLog>> {
        let rows = sqlx::query(
            "SELECT id, run_time, tasks_executed, duration FROM cron_logs \
             ORDER BY run_time DESC, id DESC LIMIT ?1",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_log).collect()
    }
}
