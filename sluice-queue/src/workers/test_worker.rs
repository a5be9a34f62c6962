use async_trait::async_trait;
use serde_json::Value;

use crate::message::Message;
use crate::worker::{Worker, WorkerResult};

/// Returns `payload.result`, or `true` when absent.
///
/// Used to exercise the dispatcher end to end.
#[derive(Debug, Default, Clone, Copy)]
pub struct TestWorker;

impl TestWorker {
    pub const KEY: &'static str = "test";
}

#[async_trait]
impl Worker for TestWorker {
    async fn process_message(&self, message: &Message) -> WorkerResult<Value> {
        Ok(message
            .payload
            .get("result")
            .cloned()
            .unwrap_or(Value::Bool(true)))
    }
}
