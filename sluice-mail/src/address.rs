//! Email addresses.

use crate::{MailError, MailResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Email address with optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub email: String,
    pub name: Option<String>,
}

impl Address {
    /// Address without a display name.
    pub fn new(email: impl Into<String>) -> MailResult<Self> {
        let email = email.into().trim().to_string();
        check_email(&email)?;
        Ok(Self { email, name: None })
    }

    /// Address with a display name.
    pub fn with_name(email: impl Into<String>, name: impl Into<String>) -> MailResult<Self> {
        let mut address = Self::new(email)?;
        address.name = Some(name.into());
        Ok(address)
    }

    /// Parse `"Name <email@example.com>"` or a bare `email@example.com`.
    pub fn parse(s: &str) -> MailResult<Self> {
        let s = s.trim();

        match (s.find('<'), s.rfind('>')) {
            (Some(start), Some(end)) if start < end => {
                let name = s[..start].trim().trim_matches('"');
                let email = &s[start + 1..end];
                if name.is_empty() {
                    Self::new(email)
                } else {
                    Self::with_name(email, name)
                }
            }
            _ => Self::new(s),
        }
    }

    /// Parse a comma separated recipient list.
    pub fn parse_list(s: &str) -> MailResult<Vec<Self>> {
        let addresses = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Self::parse)
            .collect::<MailResult<Vec<_>>>()?;

        if addresses.is_empty() {
            return Err(MailError::MissingField("to"));
        }
        Ok(addresses)
    }

    pub(crate) fn to_mailbox(&self) -> MailResult<lettre::message::Mailbox> {
        let address: lettre::Address = self.email.parse()?;
        Ok(lettre::message::Mailbox::new(self.name.clone(), address))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, self.email),
            None => write!(f, "{}", self.email),
        }
    }
}

impl TryFrom<&str> for Address {
    type Error = MailError;

    fn try_from(s: &str) -> MailResult<Self> {
        Self::parse(s)
    }
}

fn check_email(email: &str) -> MailResult<()> {
    if email.is_empty() {
        return Err(MailError::InvalidAddress(
            "Email cannot be empty".to_string(),
        ));
    }

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(MailError::InvalidAddress(email.to_string()))
    }
}
