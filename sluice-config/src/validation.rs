// Configuration validation

use crate::{ConfigError, ConfigResult};
use std::fmt::Display;

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> ConfigResult<()>;
}

/// Validation rules shared by the typed settings
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a value is not empty
    pub fn not_empty(value: &str, field: &str) -> ConfigResult<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
        Ok(())
    }

    /// Validate that a number is within an inclusive range
    pub fn in_range<T: PartialOrd + Display>(value: T, min: T, max: T, field: &str) -> ConfigResult<()> {
        if value < min || value > max {
            return Err(ConfigError::ValidationError(format!(
                "{} must be between {} and {}, got {}",
                field, min, max, value
            )));
        }
        Ok(())
    }

    /// Validate that two values differ
    pub fn distinct<T: PartialEq + Display>(a: &T, b: &T, field: &str) -> ConfigResult<()> {
        if a == b {
            return Err(ConfigError::ValidationError(format!(
                "{} must differ, both are {}",
                field, a
            )));
        }
        Ok(())
    }

    /// Validate a file name that must stay inside its directory
    pub fn is_file_name(value: &str, field: &str) -> ConfigResult<()> {
        Self::not_empty(value, field)?;
        if value.contains('/') || value.contains('\\') || value == "." || value == ".." {
            return Err(ConfigError::ValidationError(format!(
                "{} must be a plain file name, got {}",
                field, value
            )));
        }
        Ok(())
    }

    /// Validate email format (basic)
    pub fn is_email(value: &str, field: &str) -> ConfigResult<()> {
        match value.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
            _ => Err(ConfigError::ValidationError(format!(
                "{} must be a valid email",
                field
            ))),
        }
    }

    /// Validate port number
    pub fn is_port(value: u16, field: &str) -> ConfigResult<()> {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{} must be a valid port number",
                field
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_empty_validation() {
        assert!(ConfigValidator::not_empty("value", "field").is_ok());
        assert!(ConfigValidator::not_empty("", "field").is_err());
        assert!(ConfigValidator::not_empty("   ", "field").is_err());
    }

    #[test]
    fn test_range_validation() {
        assert!(ConfigValidator::in_range(5, 1, 10, "field").is_ok());
        assert!(ConfigValidator::in_range(0, 1, 10, "field").is_err());
        assert!(ConfigValidator::in_range(11, 1, 10, "field").is_err());
    }

    #[test]
    fn test_distinct_validation() {
        assert!(ConfigValidator::distinct(&"a.lock", &"a.kill", "files").is_ok());
        assert!(ConfigValidator::distinct(&"a", &"a", "files").is_err());
    }

    #[test]
    fn test_file_name_validation() {
        assert!(ConfigValidator::is_file_name("queue.lock", "lock_file").is_ok());
        assert!(ConfigValidator::is_file_name("../queue.lock", "lock_file").is_err());
        assert!(ConfigValidator::is_file_name("..", "lock_file").is_err());
    }

    #[test]
    fn test_email_validation() {
        assert!(ConfigValidator::is_email("shop@example.com", "from").is_ok());
        assert!(ConfigValidator::is_email("@example.com", "from").is_err());
        assert!(ConfigValidator::is_email("shop", "from").is_err());
    }

    #[test]
    fn test_port_validation() {
        assert!(ConfigValidator::is_port(587, "field").is_ok());
        assert!(ConfigValidator::is_port(0, "field").is_err());
    }
}
