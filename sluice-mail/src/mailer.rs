//! Mailer contract and implementations.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
    transport::smtp::authentication::Credentials,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{Address, Email, MailError, MailResult};

/// Sends mail on behalf of workers.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send a prepared email. `Ok(false)` means the server refused it.
    async fn send(&self, email: &Email) -> MailResult<bool>;

    /// Build and send a plain-text email.
    async fn send_mail(&self, from: &str, to: &str, subject: &str, body: &str) -> MailResult<bool> {
        let email = Email::new(from, to, subject, body)?;
        self.send(&email).await
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

/// SMTP security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmtpSecurity {
    /// No encryption (port 25, not recommended).
    None,
    /// STARTTLS upgrade (port 587).
    #[default]
    StartTls,
    /// Implicit TLS (port 465).
    Tls,
}

/// SMTP configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub security: SmtpSecurity,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

impl SmtpConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 587,
            security: SmtpSecurity::StartTls,
            username: None,
            password: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the port. Call after choosing the security mode, which resets it.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn starttls(mut self) -> Self {
        self.security = SmtpSecurity::StartTls;
        self.port = 587;
        self
    }

    pub fn tls(mut self) -> Self {
        self.security = SmtpSecurity::Tls;
        self.port = 465;
        self
    }

    pub fn insecure(mut self) -> Self {
        self.security = SmtpSecurity::None;
        self.port = 25;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Mailer backed by an async SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> MailResult<Self> {
        if config.host.trim().is_empty() {
            return Err(MailError::Config("SMTP host is empty".to_string()));
        }

        let mut builder = match config.security {
            SmtpSecurity::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            }
            SmtpSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            }
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?,
        };

        builder = builder.port(config.port).timeout(Some(config.timeout));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        info!(
            host = %config.host,
            port = config.port,
            security = ?config.security,
            "SMTP mailer initialized"
        );

        Ok(Self {
            transport: builder.build(),
            config,
        })
    }

    pub fn config(&self) -> &SmtpConfig {
        &self.config
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> MailResult<bool> {
        let message = email.to_lettre()?;

        debug!(
            to = ?email.to.iter().map(|a| &a.email).collect::<Vec<_>>(),
            subject = %email.subject,
            "Sending email via SMTP"
        );

        let response = self.transport.send(message).await?;
        if !response.is_positive() {
            warn!(code = %response.code(), "SMTP server refused message");
        }
        Ok(response.is_positive())
    }

    async fn is_healthy(&self) -> bool {
        self.transport.test_connection().await.unwrap_or(false)
    }
}

/// Mailer that records messages instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct MemoryMailer {
    outbox: Arc<Mutex<Vec<Email>>>,
    refuse: bool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose server refuses every message (`send` returns `Ok(false)`).
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    /// Accepted messages, oldest first.
    pub fn outbox(&self) -> Vec<Email> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }

    pub fn sent_count(&self) -> usize {
        self.outbox.lock().map(|outbox| outbox.len()).unwrap_or(0)
    }

    /// Whether any accepted message went to `email`.
    pub fn sent_to(&self, email: &str) -> bool {
        self.outbox()
            .iter()
            .any(|m| m.to.iter().any(|a: &Address| a.email == email))
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: &Email) -> MailResult<bool> {
        email.validate()?;
        if self.refuse {
            return Ok(false);
        }
        let mut outbox = self
            .outbox
            .lock()
            .map_err(|_| MailError::Config("outbox lock poisoned".to_string()))?;
        outbox.push(email.clone());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smtp_config_builder() {
        let config = SmtpConfig::new("smtp.example.com")
            .tls()
            .port(2465)
            .credentials("user", "pass");

        assert_eq!(config.port, 2465);
        assert_eq!(config.security, SmtpSecurity::Tls);
        assert_eq!(config.username.as_deref(), Some("user"));
    }

    #[test]
    fn test_security_presets_set_port() {
        assert_eq!(SmtpConfig::new("h").insecure().port, 25);
        assert_eq!(SmtpConfig::new("h").starttls().port, 587);
    }

    #[test]
    fn test_empty_host_rejected() {
        assert!(matches!(
            SmtpMailer::new(SmtpConfig::new(" ")),
            Err(MailError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_smtp_mailer_builds_without_connecting() {
        let mailer = SmtpMailer::new(SmtpConfig::new("localhost").insecure().port(2525)).unwrap();
        assert_eq!(mailer.config().port, 2525);
    }

    #[tokio::test]
    async fn test_memory_mailer_records() {
        let mailer = MemoryMailer::new();
        let sent = mailer
            .send_mail("shop@example.com", "a@example.com", "Hi", "body")
            .await
            .unwrap();

        assert!(sent);
        assert_eq!(mailer.sent_count(), 1);
        assert!(mailer.sent_to("a@example.com"));
    }

    #[tokio::test]
    async fn test_refusing_mailer() {
        let mailer = MemoryMailer::refusing();
        let sent = mailer
            .send_mail("shop@example.com", "a@example.com", "Hi", "body")
            .await
            .unwrap();

        assert!(!sent);
        assert_eq!(mailer.sent_count(), 0);
    }
}
