//! Outbound email for newsletters.

use crate::config::SmtpConfig;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email provider not enabled: {0}")]
    NotEnabled(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Send error: {0}")]
    SendFailed(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
}

impl From<EmailError> for AppError {
    fn from(err: EmailError) -> Self {
        match err {
            EmailError::NotEnabled(reason) => {
                tracing::warn!(%reason, "Email delivery requested while disabled");
                AppError::ServiceUnavailable
            }
            EmailError::InvalidRecipient(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            other => AppError::EmailError(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body_text: String,
    pub body_html: String,
    /// Sets `List-Unsubscribe` when present.
    pub unsubscribe_url: Option<String>,
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, email: &EmailMessage) -> Result<(), EmailError>;

    async fn health_check(&self) -> Result<(), EmailError>;

    fn is_enabled(&self) -> bool;
}

pub struct SmtpProvider {
    config: SmtpConfig,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpProvider {
    pub fn new(config: SmtpConfig) -> Result<Self, EmailError> {
        if !config.enabled {
            return Ok(Self {
                config,
                transport: None,
            });
        }

        let creds = Credentials::new(
            config.user.clone(),
            config.password.expose_secret().clone(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| EmailError::Configuration(format!("Failed to create SMTP relay: {}", e)))?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self {
            config,
            transport: Some(transport),
        })
    }

    fn build_message(&self, email: &EmailMessage) -> Result<Message, EmailError> {
        let from_mailbox: Mailbox = format!("{} <{}>", self.config.from_name, self.config.from_email)
            .parse()
            .map_err(|e| EmailError::Configuration(format!("Invalid from address: {}", e)))?;

        let to_mailbox: Mailbox = email
            .to
            .parse()
            .map_err(|e| EmailError::InvalidRecipient(format!("{}: {}", email.to, e)))?;

        let mut builder = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(&email.subject);

        if let Some(url) = &email.unsubscribe_url {
            builder = builder.header(ListUnsubscribe(format!("<{}>", url)));
        }

        builder
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.body_text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.body_html.clone()),
                    ),
            )
            .map_err(|e| EmailError::SendFailed(format!("Failed to build message: {}", e)))
    }
}

/// `List-Unsubscribe` header.
#[derive(Debug, Clone)]
struct ListUnsubscribe(String);

impl lettre::message::header::Header for ListUnsubscribe {
    fn name() -> lettre::message::header::HeaderName {
        lettre::message::header::HeaderName::new_from_ascii_str("List-Unsubscribe")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self(s.to_string()))
    }

    fn display(&self) -> lettre::message::header::HeaderValue {
        lettre::message::header::HeaderValue::new(Self::name(), self.0.clone())
    }
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    async fn send(&self, email: &EmailMessage) -> Result<(), EmailError> {
        let transport = self.transport.as_ref().ok_or_else(|| {
            EmailError::NotEnabled("SMTP email provider is not enabled".to_string())
        })?;

        let message = self.build_message(email)?;

        transport
            .send(message)
            .await
            .map_err(|e| EmailError::SendFailed(format!("Failed to send email: {}", e)))?;

        tracing::debug!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), EmailError> {
        let Some(transport) = self.transport.as_ref() else {
            return Ok(());
        };

        transport
            .test_connection()
            .await
            .map_err(|e| EmailError::Connection(format!("SMTP connection test failed: {}", e)))?;

        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

/// Mock email provider: records messages, optionally rejecting some recipients.
pub struct MockEmailProvider {
    enabled: bool,
    send_count: AtomicU64,
    reject: HashSet<String>,
    sent: Mutex<Vec<EmailMessage>>,
}

impl MockEmailProvider {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            send_count: AtomicU64::new(0),
            reject: HashSet::new(),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Fail delivery to these addresses.
    pub fn rejecting<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            reject: addresses.into_iter().map(Into::into).collect(),
            ..Self::new(true)
        }
    }

    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EmailProvider for MockEmailProvider {
    async fn send(&self, email: &EmailMessage) -> Result<(), EmailError> {
        if !self.enabled {
            return Err(EmailError::NotEnabled(
                "Mock email provider is not enabled".to_string(),
            ));
        }

        if self.reject.contains(&email.to) {
            return Err(EmailError::InvalidRecipient(email.to.clone()));
        }

        self.send_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }

        tracing::info!(to = %email.to, subject = %email.subject, "[MOCK] Email would be sent");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), EmailError> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn smtp_config(enabled: bool) -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".into(),
            port: 587,
            user: "user".into(),
            password: Secret::new("pass".into()),
            from_email: "news@firm.example".into(),
            from_name: "Firm News".into(),
            enabled,
        }
    }

    fn message(to: &str) -> EmailMessage {
        EmailMessage {
            to: to.into(),
            subject: "Hello".into(),
            body_text: "Plain".into(),
            body_html: "<p>Plain</p>".into(),
            unsubscribe_url: Some("https://firm.example/unsubscribe?email=a".into()),
        }
    }

    #[tokio::test]
    async fn disabled_smtp_refuses_to_send() {
        let provider = SmtpProvider::new(smtp_config(false)).unwrap();
        assert!(!provider.is_enabled());
        assert!(matches!(
            provider.send(&message("a@b.com")).await,
            Err(EmailError::NotEnabled(_))
        ));
    }

    #[tokio::test]
    async fn message_carries_both_parts_and_unsubscribe_header() {
        let provider = SmtpProvider::new(smtp_config(true)).unwrap();
        let built = provider.build_message(&message("reader@example.com")).unwrap();
        let raw = String::from_utf8(built.formatted()).unwrap();

        assert!(raw.contains("List-Unsubscribe: <https://firm.example/unsubscribe?email=a>"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("text/html"));
    }

    #[tokio::test]
    async fn invalid_recipient_is_rejected_before_sending() {
        let provider = SmtpProvider::new(smtp_config(true)).unwrap();
        assert!(matches!(
            provider.build_message(&message("not an address")),
            Err(EmailError::InvalidRecipient(_))
        ));
    }

    #[tokio::test]
    async fn mock_records_and_rejects() {
        let provider = MockEmailProvider::rejecting(["bad@example.com"]);
        provider.send(&message("good@example.com")).await.unwrap();
        assert!(provider.send(&message("bad@example.com")).await.is_err());

        assert_eq!(provider.send_count(), 1);
        assert_eq!(provider.sent()[0].to, "good@example.com");
    }
}
