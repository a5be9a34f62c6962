//! Layered configuration for sluice.
//!
//! Values are kept as dotted keys (`queue.sleep_ms`) in a [`ConfigManager`].
//! Sources are applied in order, later ones winning:
//!
//! 1. built-in defaults ([`SluiceConfig::default`])
//! 2. a JSON, TOML or `.env` style file
//! 3. a `.env` file in the working directory
//! 4. `SLUICE_*` process environment variables (`__` separates sections)
//!
//! Command-line flags are applied on top by the binary.
//!
//! ```rust,no_run
//! use sluice_config::SluiceConfig;
//!
//! let config = SluiceConfig::load(None).unwrap();
//! println!("lock file: {}", config.lock_path().display());
//! ```

pub mod env;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, FileFormat};
pub use settings::{MailSettings, QueueSettings, SluiceConfig};
pub use validation::{ConfigValidator, Validate};

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Prefix of the environment variables read by default.
pub const ENV_PREFIX: &str = "SLUICE";

/// Main configuration manager
#[derive(Clone)]
pub struct ConfigManager {
    config: Arc<RwLock<HashMap<String, Value>>>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(HashMap::new())),
            env_prefix: None,
        }
    }

    /// Create with environment variable prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            config: Arc::new(RwLock::new(HashMap::new())),
            env_prefix: Some(prefix.into()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Value>> {
        self.config.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Value>> {
        self.config.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Load configuration from environment variables
    pub fn load_env(&self) -> ConfigResult<()> {
        let loader = EnvLoader::new(self.env_prefix.clone());
        self.apply_strings(loader.load()?);
        Ok(())
    }

    /// Load configuration from explicit variable pairs, as if they were the environment
    pub fn load_vars<I>(&self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let loader = EnvLoader::new(self.env_prefix.clone());
        self.apply_strings(loader.load_from(vars));
    }

    fn apply_strings(&self, values: HashMap<String, String>) {
        let mut config = self.write();
        for (key, value) in values {
            config.insert(key, Value::String(value));
        }
    }

    /// Load a .env file into the process environment, then reload the environment.
    ///
    /// Variables already present in the environment are not overridden.
    pub fn load_dotenv(&self, path: Option<&Path>) -> ConfigResult<()> {
        if let Some(path) = path {
            dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
        } else {
            dotenvy::dotenv().ok();
        }
        self.load_env()
    }

    /// Load configuration from file
    pub fn load_file(&self, path: &Path, format: FileFormat) -> ConfigResult<()> {
        let data = ConfigLoader::new(format).load_file(path)?;
        self.apply_value(data)
    }

    /// Load configuration from file, detecting the format from its extension
    pub fn load_file_auto(&self, path: &Path) -> ConfigResult<()> {
        let data = ConfigLoader::auto(path)?.load_file(path)?;
        self.apply_value(data)
    }

    fn apply_value(&self, data: Value) -> ConfigResult<()> {
        if !data.is_object() {
            return Err(ConfigError::ParseError(
                "configuration root must be a table".to_string(),
            ));
        }

        let mut config = self.write();
        for (key, value) in loader::flatten(data) {
            config.insert(key, value);
        }
        Ok(())
    }

    /// Set a configuration value
    pub fn set<T: serde::Serialize>(&self, key: &str, value: T) -> ConfigResult<()> {
        let json_value = serde_json::to_value(value)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;

        self.write().insert(key.to_string(), json_value);
        Ok(())
    }

    /// Get a configuration value
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> ConfigResult<T> {
        let value = self.raw(key)?;
        serde_json::from_value(value).map_err(|e| ConfigError::invalid(key, e.to_string()))
    }

    /// Get a configuration value with default
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    fn raw(&self, key: &str) -> ConfigResult<Value> {
        self.read()
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))
    }

    /// Get a string value; numbers and booleans are rendered
    pub fn get_string(&self, key: &str) -> ConfigResult<String> {
        match self.raw(key)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(ConfigError::invalid(key, format!("expected a string, got {}", other))),
        }
    }

    /// Get an optional string; a missing key, `null` or an empty string is `None`
    pub fn get_opt_string(&self, key: &str) -> ConfigResult<Option<String>> {
        match self.raw(key) {
            Err(ConfigError::KeyNotFound(_)) | Ok(Value::Null) => Ok(None),
            Err(e) => Err(e),
            Ok(_) => self.get_string(key).map(|s| Some(s).filter(|s| !s.is_empty())),
        }
    }

    /// Get an unsigned integer; numeric strings are parsed
    pub fn get_u64(&self, key: &str) -> ConfigResult<u64> {
        match self.raw(key)? {
            Value::Number(n) => n
                .as_u64()
                .ok_or_else(|| ConfigError::invalid(key, format!("{} is not an unsigned integer", n))),
            Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid(key, format!("{:?} is not an unsigned integer", s))),
            other => Err(ConfigError::invalid(key, format!("expected an integer, got {}", other))),
        }
    }

    /// Get an integer value
    pub fn get_int(&self, key: &str) -> ConfigResult<i64> {
        match self.raw(key)? {
            Value::Number(n) => n
                .as_i64()
                .ok_or_else(|| ConfigError::invalid(key, format!("{} is not an integer", n))),
            Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid(key, format!("{:?} is not an integer", s))),
            other => Err(ConfigError::invalid(key, format!("expected an integer, got {}", other))),
        }
    }

    /// Get a boolean value; `1/0`, `true/false`, `yes/no`, `on/off` strings are accepted
    pub fn get_bool(&self, key: &str) -> ConfigResult<bool> {
        match self.raw(key)? {
            Value::Bool(b) => Ok(b),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" | "" => Ok(false),
                _ => Err(ConfigError::invalid(key, format!("{:?} is not a boolean", s))),
            },
            Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
            other => Err(ConfigError::invalid(key, format!("expected a boolean, got {}", other))),
        }
    }

    /// Check if a key exists
    pub fn has(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Get all configuration keys
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Merge configuration from another manager, the other one winning
    pub fn merge(&self, other: &ConfigManager) {
        let other_config = other.read().clone();
        let mut config = self.write();

        for (key, value) in other_config {
            config.insert(key, value);
        }
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::with_prefix(ENV_PREFIX)
    }
}

pub mod prelude {
    pub use crate::{
        ConfigError, ConfigManager, ConfigResult, ConfigValidator, MailSettings, QueueSettings,
        SluiceConfig, Validate,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let manager = ConfigManager::new();
        manager.set("test_key", "test_value").unwrap();

        let value: String = manager.get("test_key").unwrap();
        assert_eq!(value, "test_value");
    }

    #[test]
    fn test_get_or_default() {
        let manager = ConfigManager::new();

        let value: String = manager.get_or("missing_key", "default_value".to_string());
        assert_eq!(value, "default_value");
    }

    #[test]
    fn test_has_key() {
        let manager = ConfigManager::new();
        manager.set("existing_key", "value").unwrap();

        assert!(manager.has("existing_key"));
        assert!(!manager.has("missing_key"));
    }

    #[test]
    fn test_lenient_getters_accept_strings() {
        let manager = ConfigManager::new();
        manager.set("queue.sleep_ms", "250").unwrap();
        manager.set("flag", "yes").unwrap();
        manager.set("port", 2525).unwrap();

        assert_eq!(manager.get_u64("queue.sleep_ms").unwrap(), 250);
        assert!(manager.get_bool("flag").unwrap());
        assert_eq!(manager.get_string("port").unwrap(), "2525");
    }

    #[test]
    fn test_get_u64_rejects_garbage() {
        let manager = ConfigManager::new();
        manager.set("n", "many").unwrap();
        manager.set("neg", -3).unwrap();

        assert!(matches!(
            manager.get_u64("n"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(manager.get_u64("neg").is_err());
        assert_eq!(manager.get_int("neg").unwrap(), -3);
    }

    #[test]
    fn test_opt_string() {
        let manager = ConfigManager::new();
        manager.set("empty", "").unwrap();
        manager.set("null", Value::Null).unwrap();
        manager.set("name", "mail").unwrap();

        assert_eq!(manager.get_opt_string("missing").unwrap(), None);
        assert_eq!(manager.get_opt_string("empty").unwrap(), None);
        assert_eq!(manager.get_opt_string("null").unwrap(), None);
        assert_eq!(manager.get_opt_string("name").unwrap().as_deref(), Some("mail"));
    }

    #[test]
    fn test_load_vars_uses_prefix() {
        let manager = ConfigManager::with_prefix("SLUICE");
        manager.load_vars(vec![
            ("SLUICE_QUEUE__NAME".to_string(), "mail".to_string()),
            ("OTHER_QUEUE__NAME".to_string(), "ignored".to_string()),
        ]);

        assert_eq!(manager.keys(), vec!["queue.name".to_string()]);
    }

    #[test]
    fn test_merge_other_wins() {
        let a = ConfigManager::new();
        let b = ConfigManager::new();
        a.set("k", 1).unwrap();
        b.set("k", 2).unwrap();
        a.merge(&b);

        assert_eq!(a.get_int("k").unwrap(), 2);
    }
}
