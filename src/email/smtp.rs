use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{EmailMessage, Mailer};
use crate::config::SmtpConfig;
use crate::DashboardError;

/// Sends mail through an SMTP relay.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    timeout: Duration,
}

impl SmtpMailer {
    pub fn from_config(config: &SmtpConfig) -> Result<Self, DashboardError> {
        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| DashboardError::Configuration(format!("smtp relay: {e}")))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        let mut builder = builder.port(config.port).timeout(Some(config.timeout));
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.expose_secret().to_owned(),
            ));
        }

        let from = config
            .from_email
            .parse::<Mailbox>()
            .map_err(|e| DashboardError::Configuration(format!("FROM_EMAIL: {e}")))?;

        Ok(Self {
            transport: builder.build(),
            from,
            timeout: config.timeout,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), DashboardError> {
        let to = message
            .to
            .parse::<Mailbox>()
            .map_err(|e| DashboardError::Email(format!("recipient: {e}")))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body)
            .map_err(|e| DashboardError::Email(e.to_string()))?;

        match tokio::time::timeout(self.timeout, self.transport.send(email)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(DashboardError::Email(e.to_string())),
            Err(_) => Err(DashboardError::Email(format!(
                "timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}
