//! Error types for the sluice CLI.

use sluice_config::ConfigError;
use sluice_cron::CronError;
use sluice_mail::MailError;
use sluice_queue::QueueError;
use thiserror::Error;

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded or failed validation
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Queue setup or dispatcher failure (including a held lock)
    #[error("{0}")]
    Queue(#[from] QueueError),

    #[error("{0}")]
    Cron(#[from] CronError),

    /// Mail transport could not be configured
    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Health check failed
    #[error("Heartbeat {0}")]
    Unhealthy(String),
}

impl CliError {
    /// Short hint printed under the error, when one helps.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            CliError::Queue(QueueError::LockHeld(_)) => {
                Some("another dispatcher owns this runtime directory; run `sluice stop-queue` to stop it")
            }
            CliError::Unhealthy(_) => Some("check that `sluice run-cron` is triggered every minute"),
            _ => None,
        }
    }
}
