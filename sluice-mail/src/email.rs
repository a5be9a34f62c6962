//! Outgoing message.

use crate::{Address, MailError, MailResult};
use lettre::message::{MultiPart, header::ContentType};
use serde::{Deserialize, Serialize};

/// A plain-text email with an optional HTML alternative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub from: Address,
    pub to: Vec<Address>,
    pub subject: String,
    pub body: String,
    pub html: Option<String>,
}

impl Email {
    /// Build from raw strings; `to` may be a comma separated list.
    pub fn new(from: &str, to: &str, subject: &str, body: &str) -> MailResult<Self> {
        let email = Self {
            from: Address::parse(from)?,
            to: Address::parse_list(to)?,
            subject: subject.to_string(),
            body: body.to_string(),
            html: None,
        };
        email.validate()?;
        Ok(email)
    }

    /// Attach an HTML alternative to the text body.
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    pub fn validate(&self) -> MailResult<()> {
        if self.to.is_empty() {
            return Err(MailError::MissingField("to"));
        }
        if self.subject.trim().is_empty() {
            return Err(MailError::MissingField("subject"));
        }
        Ok(())
    }

    pub(crate) fn to_lettre(&self) -> MailResult<lettre::Message> {
        self.validate()?;

        let mut builder = lettre::Message::builder()
            .from(self.from.to_mailbox()?)
            .subject(self.subject.clone());

        for addr in &self.to {
            builder = builder.to(addr.to_mailbox()?);
        }

        let message = match &self.html {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                self.body.clone(),
                html.clone(),
            ))?,
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(self.body.clone())?,
        };

        Ok(message)
    }
}
