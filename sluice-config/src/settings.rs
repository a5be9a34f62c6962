//! Typed settings for the sluice runtime

use crate::{ConfigError, ConfigManager, ConfigResult, ConfigValidator, Validate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Dispatcher settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Pause between ticks, in milliseconds
    pub sleep_ms: u64,
    /// Tick cap per run
    pub max_executions: u64,
    /// Lock file name inside the runtime directory
    pub lock_file: String,
    /// Kill-sentinel file name inside the runtime directory
    pub kill_file: String,
    /// Queue to drain; all queues when unset
    pub name: Option<String>,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            sleep_ms: 500,
            max_executions: 100_000,
            lock_file: "queue.lock".to_string(),
            kill_file: "queue.kill".to_string(),
            name: None,
        }
    }
}

/// SMTP settings for the mail worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailSettings {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub default_from: Option<String>,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: 587,
            username: None,
            password: None,
            default_from: None,
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SluiceConfig {
    /// sqlx connection string for the message and cron stores
    pub database_url: String,
    /// Directory holding the lock file and the kill-sentinel
    pub runtime_dir: PathBuf,
    pub queue: QueueSettings,
    pub mail: MailSettings,
}

impl Default for SluiceConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://sluice.db?mode=rwc".to_string(),
            runtime_dir: std::env::temp_dir().join("sluice"),
            queue: QueueSettings::default(),
            mail: MailSettings::default(),
        }
    }
}

impl SluiceConfig {
    /// Load defaults, then `file` (if any), then `.env`, then the `SLUICE_*` environment.
    pub fn load(file: Option<&Path>) -> ConfigResult<Self> {
        let manager = ConfigManager::default();
        if let Some(path) = file {
            manager.load_file_auto(path)?;
        }
        manager.load_dotenv(None)?;
        Self::from_manager(&manager)
    }

    /// Build from the keys present in `manager`, falling back to defaults.
    pub fn from_manager(manager: &ConfigManager) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(url) = manager.get_opt_string("database_url")? {
            config.database_url = url;
        }
        if let Some(dir) = manager.get_opt_string("runtime_dir")? {
            config.runtime_dir = PathBuf::from(dir);
        }

        if manager.has("queue.sleep_ms") {
            config.queue.sleep_ms = manager.get_u64("queue.sleep_ms")?;
        }
        if manager.has("queue.max_executions") {
            config.queue.max_executions = manager.get_u64("queue.max_executions")?;
        }
        if let Some(lock_file) = manager.get_opt_string("queue.lock_file")? {
            config.queue.lock_file = lock_file;
        }
        if let Some(kill_file) = manager.get_opt_string("queue.kill_file")? {
            config.queue.kill_file = kill_file;
        }
        if manager.has("queue.name") {
            config.queue.name = manager.get_opt_string("queue.name")?;
        }

        if manager.has("mail.smtp_host") {
            config.mail.smtp_host = manager.get_opt_string("mail.smtp_host")?;
        }
        if manager.has("mail.smtp_port") {
            let port = manager.get_u64("mail.smtp_port")?;
            config.mail.smtp_port = u16::try_from(port)
                .map_err(|_| ConfigError::invalid("mail.smtp_port", format!("{} is out of range", port)))?;
        }
        if manager.has("mail.username") {
            config.mail.username = manager.get_opt_string("mail.username")?;
        }
        if manager.has("mail.password") {
            config.mail.password = manager.get_opt_string("mail.password")?;
        }
        if manager.has("mail.default_from") {
            config.mail.default_from = manager.get_opt_string("mail.default_from")?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.runtime_dir.join(&self.queue.lock_file)
    }

    pub fn kill_path(&self) -> PathBuf {
        self.runtime_dir.join(&self.queue.kill_file)
    }

    pub fn sleep_interval(&self) -> Duration {
        Duration::from_millis(self.queue.sleep_ms)
    }
}

impl Validate for SluiceConfig {
    fn validate(&self) -> ConfigResult<()> {
        ConfigValidator::not_empty(&self.database_url, "database_url")?;
        ConfigValidator::not_empty(&self.runtime_dir.to_string_lossy(), "runtime_dir")?;
        ConfigValidator::in_range(self.queue.max_executions, 1, u64::MAX, "queue.max_executions")?;
        ConfigValidator::in_range(self.queue.sleep_ms, 0, 3_600_000, "queue.sleep_ms")?;
        ConfigValidator::is_file_name(&self.queue.lock_file, "queue.lock_file")?;
        ConfigValidator::is_file_name(&self.queue.kill_file, "queue.kill_file")?;
        ConfigValidator::distinct(
            &self.queue.lock_file,
            &self.queue.kill_file,
            "queue.lock_file and queue.kill_file",
        )?;
        ConfigValidator::is_port(self.mail.smtp_port, "mail.smtp_port")?;
        if let Some(ref from) = self.mail.default_from {
            ConfigValidator::is_email(from, "mail.default_from")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SluiceConfig::default();
        assert_eq!(config.queue.sleep_ms, 500);
        assert_eq!(config.queue.max_executions, 100_000);
        assert_eq!(config.mail.smtp_port, 587);
        assert!(config.lock_path().ends_with("queue.lock"));
        assert!(config.kill_path().ends_with("queue.kill"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_empty_manager_is_default() {
        let config = SluiceConfig::from_manager(&ConfigManager::new()).unwrap();
        assert_eq!(config, SluiceConfig::default());
    }

    #[test]
    fn test_from_manager_overrides() {
        let manager = ConfigManager::new();
        manager.set("runtime_dir", "/var/run/sluice").unwrap();
        manager.set("queue.sleep_ms", "20").unwrap();
        manager.set("queue.name", "mail").unwrap();
        manager.set("mail.smtp_port", 2525).unwrap();

        let config = SluiceConfig::from_manager(&manager).unwrap();
        assert_eq!(config.runtime_dir, PathBuf::from("/var/run/sluice"));
        assert_eq!(config.sleep_interval(), Duration::from_millis(20));
        assert_eq!(config.queue.name.as_deref(), Some("mail"));
        assert_eq!(config.mail.smtp_port, 2525);
    }

    #[test]
    fn test_zero_executions_rejected() {
        let manager = ConfigManager::new();
        manager.set("queue.max_executions", 0).unwrap();

        assert!(matches!(
            SluiceConfig::from_manager(&manager),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_same_lock_and_kill_file_rejected() {
        let mut config = SluiceConfig::default();
        config.queue.kill_file = config.queue.lock_file.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_port_out_of_range() {
        let manager = ConfigManager::new();
        manager.set("mail.smtp_port", 70000).unwrap();
        assert!(matches!(
            SluiceConfig::from_manager(&manager),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
