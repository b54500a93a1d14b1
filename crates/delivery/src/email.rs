//! Campaign email delivery via SMTP.
//!
//! [`SmtpMailer`] wraps the `lettre` async SMTP transport and sends one HTML
//! message per call. Configuration is loaded from environment variables; if
//! `SMTP_HOST` is not set, [`EmailConfig::from_env`] returns `None` and no
//! mailer should be constructed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for email delivery failures.
///
/// The `Display` text is what ends up in `customers.fail_reason`.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// SMTP transport-level failure (authentication, connection, rejection).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),

    /// The SMTP settings are unusable.
    #[error("Invalid SMTP configuration: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Mailer
// ---------------------------------------------------------------------------

/// One rendered message addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Async email sending capability.
///
/// The worker only depends on this trait, so tests and alternative backends
/// can stand in for SMTP.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Transmit `email`. Any error means the message was not accepted.
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (implicit TLS).
const DEFAULT_SMTP_PORT: u16 = 465;

/// Port on which implicit TLS is the default.
const IMPLICIT_TLS_PORT: u16 = 465;

/// Sender address when neither `SMTP_FROM` nor `SMTP_USER` is set.
const DEFAULT_FROM_ADDRESS: &str = "noreply@localhost";

/// Default connection/command timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// TLS from the first byte (SMTPS, usually port 465).
    Tls,
    /// Plain connection upgraded with STARTTLS (usually port 587).
    StartTls,
    /// No encryption. Local relays and test servers only.
    None,
}

impl TlsMode {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "tls" => Some(Self::Tls),
            "starttls" => Some(Self::StartTls),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

/// Configuration for the SMTP email delivery service.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 465).
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    /// Display name shown with the From address.
    pub from_name: Option<String>,
    /// Optional SMTP username.
    pub smtp_user: Option<String>,
    /// Optional SMTP password.
    pub smtp_password: Option<String>,
    pub tls: TlsMode,
    pub timeout: Duration,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `SMTP_HOST` is not set.
    ///
    /// | Variable            | Required | Default                                |
    /// |---------------------|----------|----------------------------------------|
    /// | `SMTP_HOST`         | yes      |                                        |
    /// | `SMTP_PORT`         | no       | `465`                                  |
    /// | `SMTP_USER`         | no       | none                                   |
    /// | `SMTP_PASSWORD`     | no       | `SMTP_PASS`, else none                 |
    /// | `SMTP_FROM`         | no       | `SMTP_USER`, else `noreply@localhost`  |
    /// | `SMTP_TLS`          | no       | `tls` on 465, `starttls` otherwise     |
    /// | `SMTP_TIMEOUT_SECS` | no       | `30`                                   |
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let smtp_host = get("SMTP_HOST").filter(|h| !h.is_empty())?;
        let smtp_port = get("SMTP_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_SMTP_PORT);
        let smtp_user = get("SMTP_USER").filter(|u| !u.is_empty());
        let smtp_password = get("SMTP_PASSWORD").or_else(|| get("SMTP_PASS"));
        let from_address = get("SMTP_FROM")
            .filter(|f| !f.is_empty())
            .or_else(|| smtp_user.clone())
            .unwrap_or_else(|| DEFAULT_FROM_ADDRESS.to_string());
        let tls = get("SMTP_TLS")
            .and_then(|t| TlsMode::parse(&t))
            .unwrap_or(if smtp_port == IMPLICIT_TLS_PORT {
                TlsMode::Tls
            } else {
                TlsMode::StartTls
            });
        let timeout = Duration::from_secs(
            get("SMTP_TIMEOUT_SECS")
                .and_then(|t| t.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        );

        Some(Self {
            smtp_host,
            smtp_port,
            from_name: smtp_user.clone(),
            from_address,
            smtp_user,
            smtp_password,
            tls,
            timeout,
        })
    }
}

// ---------------------------------------------------------------------------
// SmtpMailer
// ---------------------------------------------------------------------------

/// Sends campaign emails via SMTP.
///
/// The transport is built once and its connection pool is reused across
/// sends.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: Arc<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build the SMTP transport and parse the sender mailbox.
    pub fn new(config: &EmailConfig) -> Result<Self, MailError> {
        let from = Mailbox::new(
            config.from_name.clone(),
            config.from_address.parse::<Address>()?,
        );

        let mut builder = match config.tls {
            TlsMode::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?,
            TlsMode::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            }
            TlsMode::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
            }
        }
        .port(config.smtp_port)
        .timeout(Some(config.timeout));

        match (&config.smtp_user, &config.smtp_password) {
            (Some(user), Some(pass)) => {
                builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
            }
            (Some(_), None) => {
                return Err(MailError::Config(
                    "SMTP_USER is set but SMTP_PASSWORD is missing".to_string(),
                ));
            }
            _ => {}
        }

        tracing::info!(
            host = %config.smtp_host,
            port = config.smtp_port,
            tls = ?config.tls,
            from = %from,
            "SMTP mailer configured"
        );

        Ok(Self {
            transport: Arc::new(builder.build()),
            from,
        })
    }

    /// Assemble the MIME message for `email`.
    fn build_message(&self, email: &OutgoingEmail) -> Result<Message, MailError> {
        Message::builder()
            .from(self.from.clone())
            .to(Mailbox::new(None, email.to.parse::<Address>()?))
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_HTML)
            .body(email.html.clone())
            .map_err(|e| MailError::Build(e.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let message = self.build_message(email)?;
        self.transport.send(message).await?;

        tracing::info!(to = %email.to, "Campaign email sent");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
