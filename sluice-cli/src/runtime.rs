//! Wiring shared by the commands: configuration, stores and registries.

use chrono::TimeDelta;
use sluice_config::SluiceConfig;
use sluice_cron::{CallableRegistry, QUEUE_PURGE, SqliteCronStore};
use sluice_log::Logger;
use sluice_mail::{SmtpConfig, SmtpMailer};
use sluice_queue::workers::{MailWorker, TestWorker};
use sluice_queue::{MessageStore, SqliteMessageStore, WorkerRegistry, connect_pool};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::CliResult;

/// Processed messages older than this are removed by the purge callable.
const PURGE_RETENTION_DAYS: i64 = 7;

/// Flags that override the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_file: Option<PathBuf>,
    pub database_url: Option<String>,
    pub runtime_dir: Option<PathBuf>,
}

pub struct Runtime {
    pub config: SluiceConfig,
    pub logger: Logger,
}

impl Runtime {
    /// Load configuration layers, then apply command-line overrides.
    pub fn load(overrides: Overrides) -> CliResult<Self> {
        let mut config = SluiceConfig::load(overrides.config_file.as_deref())?;
        if let Some(url) = overrides.database_url {
            config.database_url = url;
        }
        if let Some(dir) = overrides.runtime_dir {
            config.runtime_dir = dir;
        }

        Ok(Self {
            config,
            logger: Logger::new("sluice"),
        })
    }

    pub async fn message_store(&self) -> CliResult<Arc<SqliteMessageStore>> {
        let pool = connect_pool(&self.config.database_url).await?;
        Ok(Arc::new(SqliteMessageStore::new(pool).await?))
    }

    /// Message and cron stores over one pool.
    pub async fn stores(&self) -> CliResult<(Arc<SqliteMessageStore>, Arc<SqliteCronStore>)> {
        let pool = connect_pool(&self.config.database_url).await?;
        let messages = SqliteMessageStore::new(pool.clone()).await?;
        let cron = SqliteCronStore::new(pool).await?;
        Ok((Arc::new(messages), Arc::new(cron)))
    }

    /// Workers available to the dispatcher.
    ///
    /// The mail worker is only registered when an SMTP host is configured;
    /// mail messages otherwise stay pending.
    pub fn workers(&self) -> CliResult<WorkerRegistry> {
        let mut registry = WorkerRegistry::new();
        registry.register(TestWorker::KEY, || Arc::new(TestWorker));

        let mail = &self.config.mail;
        if let Some(host) = mail.smtp_host.as_deref() {
            let mut smtp = SmtpConfig::new(host).port(mail.smtp_port);
            if let (Some(user), Some(pass)) = (&mail.username, &mail.password) {
                smtp = smtp.credentials(user.clone(), pass.clone());
            }
            let mut worker = MailWorker::new(Arc::new(SmtpMailer::new(smtp)?));
            if let Some(from) = mail.default_from.as_deref() {
                worker = worker.with_default_from(from);
            }
            registry.register_instance(MailWorker::KEY, Arc::new(worker));
        } else {
            self.logger
                .debug("no SMTP host configured, mail worker not registered");
        }

        Ok(registry)
    }

    /// Built-in callables plus the queue purge.
    pub fn callables(&self, messages: Arc<dyn MessageStore>) -> CallableRegistry {
        let mut registry = CallableRegistry::with_builtins();
        registry.register_queue_purge(
            QUEUE_PURGE,
            messages,
            TimeDelta::days(PURGE_RETENTION_DAYS),
        );
        registry
    }
}
