//! SMTP delivery through lettre.

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};

use crate::config::{MailConfig, SmtpSecurity};
use crate::error::NotificationError;
use crate::notifier::Notifier;

/// Sends mail through a pooled SMTP connection.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    /// Builds the transport. No connection is opened until the first send.
    pub fn new(config: &MailConfig) -> Result<Self, NotificationError> {
        config.validate()?;

        let host = config
            .smtp_host
            .as_deref()
            .ok_or(NotificationError::InvalidConfig("Missing smtp_host".into()))?;

        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| NotificationError::invalid_address(&config.from, e))?;

        let mut builder = match config.security {
            SmtpSecurity::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
            SmtpSecurity::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| NotificationError::InvalidConfig(e.to_string()))?,
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| NotificationError::InvalidConfig(e.to_string()))?,
        }
        .port(config.smtp_port)
        .timeout(Some(Duration::from_secs(config.timeout_secs)));

        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<String, NotificationError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(to
                .parse()
                .map_err(|e| NotificationError::invalid_address(to, e))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        let response = self
            .transport
            .send(email)
            .await
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        Ok(response.message().collect::<Vec<_>>().join(" "))
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
