//! Running a worker against a message and recording the outcome.

use serde_json::Value;

use crate::error::QueueResult;
use crate::message::{Message, MessageResult};
use crate::store::MessageStore;
use crate::worker::Worker;

/// Truthiness of a worker's return value.
///
/// `null` and `false` are falsy, numbers are truthy when non-zero, strings
/// when non-empty and not `"0"`, arrays and objects when non-empty.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

impl MessageResult {
    pub fn from_value(value: &Value) -> Self {
        if is_truthy(value) {
            Self::EndedOk
        } else {
            Self::EndedKo
        }
    }
}

/// Invoke `worker` on `message` and persist the result.
///
/// Returns the worker's raw value. A worker error still moves the message
/// to `ended_ko` before the error is returned, so a message is never left
/// pending once its worker has run.
pub async fn process(
    worker: &dyn Worker,
    store: &dyn MessageStore,
    message: &mut Message,
) -> QueueResult<Value> {
    match worker.process_message(message).await {
        Ok(value) => {
            store
                .mark_result(message, MessageResult::from_value(&value))
                .await?;
            Ok(value)
        }
        Err(err) => {
            store.mark_result(message, MessageResult::EndedKo).await?;
            Err(err.into())
        }
    }
}
