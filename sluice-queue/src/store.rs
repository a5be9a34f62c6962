//! Message persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::error::{QueueError, QueueResult};
use crate::message::{Message, MessageId, MessageResult, Payload};

/// Durable storage for queued messages.
///
/// Stores do not lock claimed messages: a single dispatcher per queue is
/// guaranteed by the process lock, so `next_message` is a plain read.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a new pending message and return it with its assigned id.
    async fn enqueue(
        &self,
        queue_name: &str,
        worker_class: &str,
        payload: Payload,
    ) -> QueueResult<Message>;

    /// Oldest pending message, restricted to `queue_name` when given.
    async fn next_message(&self, queue_name: Option<&str>) -> QueueResult<Option<Message>> {
        self.next_message_excluding(queue_name, &[]).await
    }

    /// Oldest pending message whose id is not in `skip`.
    async fn next_message_excluding(
        &self,
        queue_name: Option<&str>,
        skip: &[MessageId],
    ) -> QueueResult<Option<Message>>;

    /// Write the terminal state and update `message` to match.
    async fn mark_result(&self, message: &mut Message, result: MessageResult) -> QueueResult<()>;

    async fn get(&self, id: MessageId) -> QueueResult<Option<Message>>;

    async fn count_pending(&self, queue_name: Option<&str>) -> QueueResult<u64>;

    /// Delete processed messages finished before `older_than`; returns how many.
    async fn purge_processed(&self, older_than: DateTime<Utc>) -> QueueResult<u64>;
}

#[derive(Default)]
struct MemoryState {
    last_id: i64,
    messages: BTreeMap<MessageId, Message>,
}

/// In-process store, ordered by id.
#[derive(Default)]
pub struct InMemoryMessageStore {
    state: RwLock<MemoryState>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message, oldest first.
    pub async fn all(&self) -> Vec<Message> {
        self.state.read().await.messages.values().cloned().collect()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn enqueue(
        &self,
        queue_name: &str,
        worker_class: &str,
        payload: Payload,
    ) -> QueueResult<Message> {
        let mut state = self.state.write().await;
        state.last_id += 1;
        let message = Message::pending(
            MessageId(state.last_id),
            queue_name,
            worker_class,
            payload,
            Utc::now(),
        );
        state.messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn next_message_excluding(
        &self,
        queue_name: Option<&str>,
        skip: &[MessageId],
    ) -> QueueResult<Option<Message>> {
        let state = self.state.read().await;
        Ok(state
            .messages
            .values()
            .find(|m| m.is_pending() && m.in_queue(queue_name) && !skip.contains(&m.id))
            .cloned())
    }

    async fn mark_result(&self, message: &mut Message, result: MessageResult) -> QueueResult<()> {
        let mut state = self.state.write().await;
        let stored = state
            .messages
            .get_mut(&message.id)
            .ok_or(QueueError::MessageNotFound(message.id))?;

        stored.finish(result, Utc::now())?;
        *message = stored.clone();
        Ok(())
    }

    async fn get(&self, id: MessageId) -> QueueResult<Option<Message>> {
        Ok(self.state.read().await.messages.get(&id).cloned())
    }

    async fn count_pending(&self, queue_name: Option<&str>) -> QueueResult<u64> {
        let state = self.state.read().await;
        Ok(state
            .messages
            .values()
            .filter(|m| m.is_pending() && m.in_queue(queue_name))
            .count() as u64)
    }

    async fn purge_processed(&self, older_than: DateTime<Utc>) -> QueueResult<u64> {
        let mut state = self.state.write().await;
        let before = state.messages.len();
        state.messages.retain(|_, m| {
            m.is_pending() || m.processed_at.is_none_or(|at| at >= older_than)
        });
        Ok((before - state.messages.len()) as u64)
    }
}
