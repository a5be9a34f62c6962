//! SQLite-backed message store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sluice_log::debug;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use crate::error::{QueueError, QueueResult};
use crate::message::{Message, MessageId, MessageResult, MessageStatus, Payload};
use crate::store::MessageStore;

const COLUMNS: &str =
    "id, queue_name, worker_class, payload, status, result, created_at, processed_at";

/// Open a pool for `database_url`.
///
/// In-memory databases are private to a connection, so they get a
/// single-connection pool.
pub async fn connect_pool(database_url: &str) -> QueueResult<SqlitePool> {
    let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
    let pool = SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { 5 })
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub struct SqliteMessageStore {
    pool: SqlitePool,
}

impl SqliteMessageStore {
    /// Wrap an existing pool and create the table if needed.
    pub async fn new(pool: SqlitePool) -> QueueResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub async fn connect(database_url: &str) -> QueueResult<Self> {
        Self::new(connect_pool(database_url).await?).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(&self) -> QueueResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS queue_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                queue_name TEXT NOT NULL,
                worker_class TEXT NOT NULL,
                payload TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                result TEXT,
                created_at TEXT NOT NULL,
                processed_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_queue_messages_pending \
             ON queue_messages (status, queue_name, id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_message(row: &SqliteRow) -> QueueResult<Message> {
        let payload: String = row.try_get("payload")?;
        let status: String = row.try_get("status")?;
        let result: Option<String> = row.try_get("result")?;

        Ok(Message {
            id: MessageId(row.try_get("id")?),
            queue_name: row.try_get("queue_name")?,
            worker_class: row.try_get("worker_class")?,
            payload: serde_json::from_str(&payload)?,
            status: status.parse()?,
            result: result.as_deref().map(str::parse).transpose()?,
            created_at: row.try_get("created_at")?,
            processed_at: row.try_get("processed_at")?,
        })
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn enqueue(
        &self,
        queue_name: &str,
        worker_class: &str,
        payload: Payload,
    ) -> QueueResult<Message> {
        let row = sqlx::query(&format!(
            "INSERT INTO queue_messages (queue_name, worker_class, payload, status, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5) RETURNING {}",
            COLUMNS
        ))
        .bind(queue_name)
        .bind(worker_class)
        .bind(serde_json::to_string(&payload)?)
        .bind(MessageStatus::Pending.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        let message = Self::row_to_message(&row)?;
        debug!(target: "sluice::store", "enqueued message {} on '{}'", message.id, queue_name);
        Ok(message)
    }

    async fn next_message_excluding(
        &self,
        queue_name: Option<&str>,
        skip: &[MessageId],
    ) -> QueueResult<Option<Message>> {
        let mut sql = format!(
            "SELECT {} FROM queue_messages WHERE status = 'pending' \
             AND (?1 IS NULL OR queue_name = ?1)",
            COLUMNS
        );
        if !skip.is_empty() {
            let placeholders: Vec<String> = (0..skip.len()).map(|i| format!("?{}", i + 2)).collect();
            sql.push_str(&format!(" AND id NOT IN ({})", placeholders.join(", ")));
        }
        sql.push_str(" ORDER BY id ASC LIMIT 1");

        let mut query = sqlx::query(&sql).bind(queue_name);
        for id in skip {
            query = query.bind(id.0);
        }

        match query.fetch_optional(&self.pool).await? {
            Some(row) => Ok(Some(Self::row_to_message(&row)?)),
            None => Ok(None),
        }
    }

    async fn mark_result(&self, message: &mut Message, result: MessageResult) -> QueueResult<()> {
        let processed_at = Utc::now();
        let updated = sqlx::query(
            "UPDATE queue_messages SET status = 'processed', result = ?2, processed_at = ?3 \
             WHERE id = ?1 AND status = 'pending'",
        )
        .bind(message.id.0)
        .bind(result.as_str())
        .bind(processed_at)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return match self.get(message.id).await? {
                Some(_) => Err(QueueError::AlreadyProcessed(message.id)),
                None => Err(QueueError::MessageNotFound(message.id)),
            };
        }

        message.finish(result, processed_at)?;
        Ok(())
    }

    async fn get(&self, id: MessageId) -> QueueResult<Option<Message>> {
        let row = sqlx::query(&format!("SELECT {} FROM queue_messages WHERE id = ?1", COLUMNS))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_message(&row)?)),
            None => Ok(None),
        }
    }

    async fn count_pending(&self, queue_name: Option<&str>) -> QueueResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM queue_messages WHERE status = 'pending' \
             AND (?1 IS NULL OR queue_name = ?1)",
        )
        .bind(queue_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn purge_processed(&self, older_than: DateTime<Utc>) -> QueueResult<u64> {
        let deleted = sqlx::query(
            "DELETE FROM queue_messages WHERE status = 'processed' AND processed_at < ?1",
        )
        .bind(older_than)
        .execute(&self.pool)
        .await?;

        Ok(deleted.rows_affected())
    }
}
