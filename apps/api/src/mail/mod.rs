//! Outgoing email. `AppState` carries an `Arc<dyn Mailer>`: SMTP when
//! `EMAIL_HOST` is set, otherwise a mailer that only logs.

pub mod templates;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, warn};

use crate::config::EmailConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("SMTP host not configured"))?;

        let builder = if config.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        }
        .port(config.smtp_port);

        let builder = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => {
                builder.credentials(Credentials::new(user.clone(), pass.clone()))
            }
            _ => builder,
        };

        Ok(Self {
            transport: builder.build(),
            from: config.from_address.parse()?,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(email.to.parse::<Mailbox>()?)
            .subject(&email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html.clone()),
                    ),
            )?;

        self.transport.send(message).await?;
        info!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }
}

/// Used when SMTP is not configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        info!(to = %email.to, subject = %email.subject, "Email not configured, message logged only");
        Ok(())
    }
}

pub fn build_mailer(config: &EmailConfig) -> Result<Arc<dyn Mailer>> {
    if config.is_configured() {
        Ok(Arc::new(SmtpMailer::new(config)?))
    } else {
        warn!("EMAIL_HOST not set, outgoing email will only be logged");
        Ok(Arc::new(LogMailer))
    }
}

/// Sends and swallows failures.
pub async fn send_best_effort(mailer: &dyn Mailer, email: OutgoingEmail) {
    if let Err(e) = mailer.send(&email).await {
        warn!("Failed to send email '{}' to {}: {e}", email.subject, email.to);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use tokio::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<OutgoingEmail>>,
        pub fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &OutgoingEmail) -> Result<()> {
            if self.fail {
                anyhow::bail!("smtp down");
            }
            self.sent.lock().await.push(email.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingMailer;
    use super::*;

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            to: "a@example.com".into(),
            subject: "Hi".into(),
            text: "hello".into(),
            html: "<p>hello</p>".into(),
        }
    }

    #[tokio::test]
    async fn test_best_effort_swallows_failure() {
        let failing = RecordingMailer {
            fail: true,
            ..Default::default()
        };
        send_best_effort(&failing, email()).await;
        assert!(failing.sent.lock().await.is_empty());

        let ok = RecordingMailer::default();
        send_best_effort(&ok, email()).await;
        assert_eq!(ok.sent.lock().await.len(), 1);
    }

    #[test]
    fn test_unconfigured_falls_back_to_log_mailer() {
        assert!(build_mailer(&EmailConfig::default()).is_ok());
    }
}
