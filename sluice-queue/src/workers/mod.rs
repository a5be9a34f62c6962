//! Built-in workers.
//!
//! [`TestWorker`] and [`MailWorker`] are registered by the `sluice` binary.
//! [`StockConsolidationWorker`] is library-only: it needs a [`StockService`]
//! supplied by the embedding application, which registers it with
//! [`WorkerRegistry::register_instance`](crate::WorkerRegistry::register_instance).

mod mail;
mod stock;
mod test_worker;

pub use mail::{MailPayload, MailWorker};
pub use stock::{StockConsolidationWorker, StockError, StockPayload, StockService};
pub use test_worker::TestWorker;

use crate::message::Message;
use crate::worker::{WorkerError, WorkerResult};
use serde::de::DeserializeOwned;

/// Decode a message payload into the worker's typed form.
pub(crate) fn decode_payload<T: DeserializeOwned>(message: &Message) -> WorkerResult<T> {
    serde_json::from_value(message.payload.clone()).map_err(|e| {
        WorkerError::InvalidPayload(format!(
            "message {} ({}): {}",
            message.id, message.worker_class, e
        ))
    })
}
