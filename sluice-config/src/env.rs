// Environment variable loading

use crate::{ConfigError, ConfigResult};
use std::collections::HashMap;
use std::env;

/// Separator between sections in a variable name (`SLUICE_QUEUE__SLEEP_MS`).
pub const SECTION_SEPARATOR: &str = "__";

/// Environment variable loader.
///
/// Variable names are mapped to dotted keys: with prefix `SLUICE`,
/// `SLUICE_QUEUE__SLEEP_MS` becomes `queue.sleep_ms`.
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    /// Create a new environment loader
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Load all matching variables of the process environment
    pub fn load(&self) -> ConfigResult<HashMap<String, String>> {
        Ok(self.load_from(env::vars()))
    }

    /// Load matching variables from an arbitrary set of pairs
    pub fn load_from<I>(&self, vars: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        vars.into_iter()
            .filter_map(|(name, value)| self.key_for(&name).map(|key| (key, value)))
            .collect()
    }

    /// Dotted config key for a variable name, if the name carries the prefix
    pub fn key_for(&self, name: &str) -> Option<String> {
        let stripped = match self.prefix {
            Some(ref prefix) => name.strip_prefix(prefix.as_str())?.strip_prefix('_')?,
            None => name,
        };

        if stripped.is_empty() {
            return None;
        }

        Some(
            stripped
                .split(SECTION_SEPARATOR)
                .map(str::to_lowercase)
                .collect::<Vec<_>>()
                .join("."),
        )
    }

    /// Load a specific environment variable by dotted key
    pub fn load_var(&self, key: &str) -> ConfigResult<String> {
        let name = key.to_uppercase().replace('.', SECTION_SEPARATOR);
        let full_key = match self.prefix {
            Some(ref prefix) => format!("{}_{}", prefix, name),
            None => name,
        };

        env::var(&full_key).map_err(ConfigError::EnvError)
    }

    /// Load with default value
    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(Some("SLUICE".to_string()))
    }
}
