//! Mail error types.

use thiserror::Error;

/// Result type for mail operations.
pub type MailResult<T> = std::result::Result<T, MailError>;

/// Mail errors.
#[derive(Debug, Error)]
pub enum MailError {
    /// SMTP protocol or connection error.
    #[error("SMTP error: {0}")]
    Smtp(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Missing required field.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Message could not be assembled.
    #[error("Failed to build message: {0}")]
    Build(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout error.
    #[error("Operation timed out")]
    Timeout,
}

impl MailError {
    /// Whether a later attempt could succeed without changing the message.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Smtp(_) | Self::Timeout)
    }
}

impl From<lettre::transport::smtp::Error> for MailError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Smtp(err.to_string())
        }
    }
}

impl From<lettre::address::AddressError> for MailError {
    fn from(err: lettre::address::AddressError) -> Self {
        Self::InvalidAddress(err.to_string())
    }
}

impl From<lettre::error::Error> for MailError {
    fn from(err: lettre::error::Error) -> Self {
        Self::Build(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(MailError::Smtp("421".into()).is_retryable());
        assert!(MailError::Timeout.is_retryable());
        assert!(!MailError::InvalidAddress("x".into()).is_retryable());
        assert!(!MailError::MissingField("subject").is_retryable());
    }
}
