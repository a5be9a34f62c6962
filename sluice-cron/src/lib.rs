//! Persisted cron tasks and a heartbeat scheduler.
//!
//! Tasks are rows in a [`CronTaskStore`]: a title, a cron expression and the
//! name of a callable in a [`CallableRegistry`]. An external trigger calls
//! [`CronScheduler::tick`] once a minute; every active task whose expression
//! has an occurrence inside the current minute is run, and one [`CronLog`]
//! row records the titles that ran.
//!
//! The built-in `heartbeat_pulse` callable, scheduled every minute through
//! [`CronTask::heartbeat`], makes every tick write a row, so the age of the
//! latest row tells whether the trigger itself is alive
//! ([`CronScheduler::heartbeat_status`]).
//!
//! ## Expressions
//!
//! ```
//! use sluice_cron::expression::{CronExpression, CronPresets};
//!
//! let daily = CronExpression::parse(CronPresets::DAILY).unwrap();
//! let now = chrono::Utc::now();
//! assert!(daily.next_after(now).unwrap() > now);
//!
//! // Standard 5-field form; Sunday is 0 or 7
//! assert!(CronExpression::parse("15 4 * * 0").is_ok());
//! ```
//!
//! ## One tick
//!
//! ```
//! use mockable::DefaultClock;
//! use sluice_cron::prelude::*;
//! use sluice_log::Logger;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> CronResult<()> {
//! let store = Arc::new(InMemoryCronStore::new());
//! store.add(CronTask::heartbeat()).await?;
//!
//! let scheduler = CronScheduler::new(
//!     store.clone(),
//!     store.clone(),
//!     Arc::new(CallableRegistry::with_builtins()),
//!     Arc::new(DefaultClock),
//!     Logger::default(),
//! );
//!
//! let report = scheduler.tick().await?;
//! assert_eq!(report.executed, vec!["heartbeat_pulse"]);
//! # Ok(())
//! # }
//! ```

pub mod callable;
pub mod error;
pub mod expression;
pub mod scheduler;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod store;
pub mod task;

pub use callable::{CallableFn, CallableRegistry, HEARTBEAT_PULSE, QUEUE_PURGE, TaskContext};
pub use error::{CronError, CronResult};
pub use expression::{CronExpression, CronPresets};
pub use scheduler::{CronScheduler, FailureKind, HeartbeatStatus, TaskFailure, TickReport};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCronStore;
pub use store::{CronLogStore, CronTaskStore, InMemoryCronStore};
pub use task::{CronLog, CronTask};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::callable::{CallableRegistry, TaskContext};
    pub use crate::error::{CronError, CronResult};
    pub use crate::expression::{CronExpression, CronPresets};
    pub use crate::scheduler::{CronScheduler, HeartbeatStatus, TickReport};
    pub use crate::store::{CronLogStore, CronTaskStore, InMemoryCronStore};
    pub use crate::task::{CronLog, CronTask};
}
