//! Outbound mail for the campaign worker.
//!
//! - [`Mailer`]: the send capability the worker depends on.
//! - [`SmtpMailer`]: the `lettre` SMTP implementation.
//! - [`EmailConfig`]: SMTP settings loaded from the environment.

pub mod email;

pub use email::{EmailConfig, MailError, Mailer, OutgoingEmail, SmtpMailer, TlsMode};
