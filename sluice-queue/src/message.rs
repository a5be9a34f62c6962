//! Message definition and lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::QueueError;

/// Message identifier, assigned by the store in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MessageId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Message payload.
pub type Payload = serde_json::Value;

/// Lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Waiting for a dispatcher
    Pending,
    /// Worker ran; terminal
    Processed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processed => "processed",
        }
    }
}

impl FromStr for MessageStatus {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processed" => Ok(Self::Processed),
            other => Err(QueueError::Store(format!("unknown message status: {}", other))),
        }
    }
}

/// Outcome written once a worker has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageResult {
    EndedOk,
    EndedKo,
}

impl MessageResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EndedOk => "ended_ok",
            Self::EndedKo => "ended_ko",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::EndedOk)
    }
}

impl FromStr for MessageResult {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ended_ok" => Ok(Self::EndedOk),
            "ended_ko" => Ok(Self::EndedKo),
            other => Err(QueueError::Store(format!("unknown message result: {}", other))),
        }
    }
}

impl fmt::Display for MessageResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of queued work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    /// Logical partition the dispatcher filters on
    pub queue_name: String,
    /// Registry key of the worker that handles the message
    pub worker_class: String,
    pub payload: Payload,
    pub status: MessageStatus,
    pub result: Option<MessageResult>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Message {
    /// A freshly enqueued message.
    pub fn pending(
        id: MessageId,
        queue_name: impl Into<String>,
        worker_class: impl Into<String>,
        payload: Payload,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            queue_name: queue_name.into(),
            worker_class: worker_class.into(),
            payload,
            status: MessageStatus::Pending,
            result: None,
            created_at,
            processed_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == MessageStatus::Pending
    }

    /// Move to the terminal state.
    pub fn finish(&mut self, result: MessageResult, at: DateTime<Utc>) -> Result<(), QueueError> {
        if !self.is_pending() {
            return Err(QueueError::AlreadyProcessed(self.id));
        }
        self.status = MessageStatus::Processed;
        self.result = Some(result);
        self.processed_at = Some(at);
        Ok(())
    }

    /// Whether the message belongs to `queue_name`; `None` matches every queue.
    pub fn in_queue(&self, queue_name: Option<&str>) -> bool {
        queue_name.is_none_or(|name| self.queue_name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message() -> Message {
        Message::pending(MessageId(1), "mail", "mail", json!({}), Utc::now())
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(MessageStatus::Pending.as_str(), "pending");
        assert_eq!("processed".parse::<MessageStatus>().unwrap(), MessageStatus::Processed);
        assert!("running".parse::<MessageStatus>().is_err());
    }

    #[test]
    fn test_result_strings() {
        assert_eq!(MessageResult::EndedKo.to_string(), "ended_ko");
        assert_eq!("ended_ok".parse::<MessageResult>().unwrap(), MessageResult::EndedOk);
        assert!("ok".parse::<MessageResult>().is_err());
    }

    #[test]
    fn test_serde_uses_persisted_forms() {
        let value = serde_json::to_value(MessageResult::EndedOk).unwrap();
        assert_eq!(value, json!("ended_ok"));
        let value = serde_json::to_value(MessageId(9)).unwrap();
        assert_eq!(value, json!(9));
    }

    #[test]
    fn test_finish_is_terminal() {
        let mut message = message();
        message.finish(MessageResult::EndedOk, Utc::now()).unwrap();

        assert_eq!(message.status, MessageStatus::Processed);
        assert!(message.processed_at.is_some());
        assert!(matches!(
            message.finish(MessageResult::EndedKo, Utc::now()),
            Err(QueueError::AlreadyProcessed(MessageId(1)))
        ));
        assert_eq!(message.result, Some(MessageResult::EndedOk));
    }

    #[test]
    fn test_in_queue() {
        let message = message();
        assert!(message.in_queue(None));
        assert!(message.in_queue(Some("mail")));
        assert!(!message.in_queue(Some("stock")));
    }
}
