use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use tracing::info;

use crate::app::ports::Mailer;
use crate::config::AppConfig;

/// SMTP delivery, e.g. through the SES SMTP interface.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: Arc<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpMailer {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let credentials = match (&config.smtp_username, &config.smtp_password) {
            (Some(user), Some(password)) => Some(Credentials::new(user.clone(), password.clone())),
            _ => None,
        };

        let transport = if config.smtp_starttls {
            let builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                .with_context(|| format!("invalid SMTP_HOST: {}", config.smtp_host))?
                .port(config.smtp_port);
            match credentials {
                Some(credentials) => builder.credentials(credentials).build(),
                None => builder.build(),
            }
        } else {
            let builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
                .port(config.smtp_port);
            match credentials {
                Some(credentials) => builder.credentials(credentials).build(),
                None => builder.build(),
            }
        };

        info!(
            host = %config.smtp_host,
            port = config.smtp_port,
            starttls = config.smtp_starttls,
            "smtp mailer initialized"
        );

        Ok(Self {
            transport: Arc::new(transport),
        })
    }
}

pub fn build_message(from: &str, to: &str, subject: &str, body: &str) -> Result<Message> {
    let from: Mailbox = from
        .parse()
        .map_err(|err| anyhow!("invalid sender address {}: {}", from, err))?;
    let to: Mailbox = to
        .parse()
        .map_err(|err| anyhow!("invalid recipient address {}: {}", to, err))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .context("failed to build email message")
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, from: &str, to: &str, subject: &str, body: &str) -> Result<()> {
        let message = build_message(from, to, subject, body)?;
        self.transport
            .send(message)
            .await
            .with_context(|| format!("failed to send email to {}", to))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::build_message;

    #[test]
    fn builds_plain_text_message() {
        let message = build_message(
            "alerts@example.com",
            "review@example.com",
            "Inappropriate Image Alert",
            "body",
        )
        .unwrap();
        let envelope = message.envelope();
        assert_eq!(envelope.from().unwrap().to_string(), "alerts@example.com");
        assert_eq!(envelope.to()[0].to_string(), "review@example.com");
    }

    #[test]
    fn rejects_invalid_recipient() {
        assert!(build_message("alerts@example.com", "not an address", "s", "b").is_err());
    }
}
