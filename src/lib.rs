// sluice - durable work queue and cron heartbeat
//
// Facade over the workspace crates: the message store and dispatcher loop,
// the cron scheduler, typed configuration, mail delivery and logging.

// Re-export the queue core
pub use sluice_queue::*;

pub use sluice_log;
pub use sluice_mail;

#[cfg(feature = "cron")]
pub use sluice_cron;

#[cfg(feature = "config")]
pub use sluice_config;

// Prelude for common imports
pub mod prelude {
    pub use sluice_log::Logger;
    pub use sluice_queue::prelude::*;

    #[cfg(feature = "cron")]
    pub use sluice_cron::prelude::*;

    #[cfg(feature = "config")]
    pub use sluice_config::SluiceConfig;
}
