use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use super::decode_payload;
use crate::message::Message;
use crate::worker::{Worker, WorkerError, WorkerResult};

/// Stock service failure.
#[derive(Debug, Error)]
#[error("stock consolidation failed: {0}")]
pub struct StockError(pub String);

impl From<StockError> for WorkerError {
    fn from(err: StockError) -> Self {
        WorkerError::Collaborator(err.to_string())
    }
}

/// Recomputes aggregated stock levels for products.
#[async_trait]
pub trait StockService: Send + Sync {
    /// Consolidate the given products; returns how many were updated.
    async fn consolidate(&self, product_ids: &[i64]) -> Result<usize, StockError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockPayload {
    pub product_ids: Vec<i64>,
}

pub struct StockConsolidationWorker {
    service: Arc<dyn StockService>,
}

impl StockConsolidationWorker {
    pub const KEY: &'static str = "stock_consolidation";

    pub fn new(service: Arc<dyn StockService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Worker for StockConsolidationWorker {
    async fn process_message(&self, message: &Message) -> WorkerResult<Value> {
        let payload: StockPayload = decode_payload(message)?;
        if payload.product_ids.is_empty() {
            return Ok(Value::Bool(true));
        }

        self.service.consolidate(&payload.product_ids).await?;
        Ok(Value::Bool(true))
    }
}
