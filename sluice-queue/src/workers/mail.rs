use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sluice_mail::Mailer;
use std::sync::Arc;

use super::decode_payload;
use crate::message::Message;
use crate::worker::{Worker, WorkerError, WorkerResult};

/// Payload of a mail message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailPayload {
    /// Sender; the worker's default sender when absent
    #[serde(default)]
    pub from: Option<String>,
    /// Recipient, or a comma separated list
    pub to: String,
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

/// Sends one email per message through a [`Mailer`].
///
/// Returns whether the mail server accepted the message.
pub struct MailWorker {
    mailer: Arc<dyn Mailer>,
    default_from: Option<String>,
}

impl MailWorker {
    pub const KEY: &'static str = "mail";

    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self {
            mailer,
            default_from: None,
        }
    }

    pub fn with_default_from(mut self, from: impl Into<String>) -> Self {
        self.default_from = Some(from.into());
        self
    }
}

#[async_trait]
impl Worker for MailWorker {
    async fn process_message(&self, message: &Message) -> WorkerResult<Value> {
        let payload: MailPayload = decode_payload(message)?;
        let from = payload
            .from
            .as_deref()
            .or(self.default_from.as_deref())
            .ok_or_else(|| {
                WorkerError::InvalidPayload(format!("message {} has no sender", message.id))
            })?;

        let sent = self
            .mailer
            .send_mail(from, &payload.to, &payload.subject, &payload.body)
            .await?;
        Ok(Value::Bool(sent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageId;
    use chrono::Utc;
    use serde_json::json;
    use sluice_mail::MemoryMailer;

    fn message(payload: Value) -> Message {
        Message::pending(MessageId(3), "mail", MailWorker::KEY, payload, Utc::now())
    }

    #[tokio::test]
    async fn test_sends_mail() {
        let mailer = MemoryMailer::new();
        let worker = MailWorker::new(Arc::new(mailer.clone()));

        let value = worker
            .process_message(&message(json!({
                "from": "shop@example.com",
                "to": "customer@example.com",
                "subject": "Order confirmed",
                "body": "Thanks"
            })))
            .await
            .unwrap();

        assert_eq!(value, json!(true));
        assert!(mailer.sent_to("customer@example.com"));
    }

    #[tokio::test]
    async fn test_uses_default_sender() {
        let mailer = MemoryMailer::new();
        let worker =
            MailWorker::new(Arc::new(mailer.clone())).with_default_from("noreply@example.com");

        worker
            .process_message(&message(json!({"to": "a@example.com", "subject": "Hi"})))
            .await
            .unwrap();

        assert_eq!(mailer.outbox()[0].from.email, "noreply@example.com");
    }

    #[tokio::test]
    async fn test_refused_mail_is_falsy() {
        let worker = MailWorker::new(Arc::new(MemoryMailer::refusing()));
        let value = worker
            .process_message(&message(json!({
                "from": "shop@example.com",
                "to": "a@example.com",
                "subject": "Hi"
            })))
            .await
            .unwrap();

        assert_eq!(value, json!(false));
    }

    #[tokio::test]
    async fn test_missing_sender_and_bad_payload() {
        let worker = MailWorker::new(Arc::new(MemoryMailer::new()));

        let no_sender = worker
            .process_message(&message(json!({"to": "a@example.com", "subject": "Hi"})))
            .await;
        assert!(matches!(no_sender, Err(WorkerError::InvalidPayload(_))));

        let no_subject = worker.process_message(&message(json!({"to": "a@example.com"}))).await;
        assert!(matches!(no_subject, Err(WorkerError::InvalidPayload(_))));
    }
}
