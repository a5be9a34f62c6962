//! # Sluice Mail
//!
//! The mail collaborator used by queue workers.
//!
//! Workers depend on the [`Mailer`] trait only. Production wires an
//! [`SmtpMailer`] (lettre over tokio, STARTTLS by default); tests use
//! [`MemoryMailer`], which keeps an outbox.
//!
//! ```rust,ignore
//! use sluice_mail::{Mailer, SmtpConfig, SmtpMailer};
//!
//! let mailer = SmtpMailer::new(
//!     SmtpConfig::new("smtp.example.com").credentials("user", "secret"),
//! )?;
//! let accepted = mailer
//!     .send_mail("shop@example.com", "customer@example.com", "Order shipped", "On its way")
//!     .await?;
//! ```

mod address;
mod email;
mod error;
mod mailer;

pub use address::Address;
pub use email::Email;
pub use error::{MailError, MailResult};
pub use mailer::{Mailer, MemoryMailer, SmtpConfig, SmtpMailer, SmtpSecurity};

pub mod prelude {
    pub use crate::{Email, MailError, MailResult, Mailer, MemoryMailer, SmtpConfig, SmtpMailer};
}
