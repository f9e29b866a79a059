use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox as Address;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use salesflow_common::SmtpConfig;

use crate::traits::{Mailer, OutgoingEmail};

/// STARTTLS SMTP sender authenticated as the configured user.
pub struct SmtpMailer {
    from: Address,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let from: Address = config
            .user
            .parse()
            .with_context(|| format!("SMTP_USER is not a valid address: {}", config.user))?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .with_context(|| format!("Invalid SMTP host {}", config.host))?
            .port(config.port)
            .credentials(Credentials::new(
                config.user.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self { from, transport })
    }

    fn message(&self, email: &OutgoingEmail) -> Result<Message> {
        let to: Address = email
            .to
            .parse()
            .with_context(|| format!("Invalid recipient address: {}", email.to))?;
        let content_type = if email.html {
            ContentType::TEXT_HTML
        } else {
            ContentType::TEXT_PLAIN
        };
        Ok(Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject)
            .header(content_type)
            .body(email.body.clone())?)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let message = self.message(email)?;
        self.transport
            .send(message)
            .await
            .with_context(|| format!("SMTP send to {} failed", email.to))?;
        info!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailer() -> SmtpMailer {
        SmtpMailer::new(&SmtpConfig {
            host: "smtp.example.com".into(),
            port: 587,
            user: "sales@example.com".into(),
            password: "pw".into(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn builds_html_message_with_headers() {
        let msg = mailer()
            .message(&OutgoingEmail::html("jane@acme.ai", "Hello", "<p>Hi</p>"))
            .unwrap();
        let raw = String::from_utf8(msg.formatted()).unwrap();
        assert!(raw.contains("To: jane@acme.ai"));
        assert!(raw.contains("Subject: Hello"));
        assert!(raw.contains("text/html"));
    }

    #[tokio::test]
    async fn rejects_bad_recipient() {
        assert!(mailer()
            .message(&OutgoingEmail::plain("not an address", "s", "b"))
            .is_err());
    }

    #[test]
    fn rejects_bad_sender() {
        let result = SmtpMailer::new(&SmtpConfig {
            host: "smtp.example.com".into(),
            port: 587,
            user: "nobody".into(),
            password: "pw".into(),
        });
        assert!(result.is_err());
    }
}
