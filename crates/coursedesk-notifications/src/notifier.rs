use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::config::MailConfig;
use crate::error::NotificationError;
use crate::smtp::SmtpNotifier;

/// Delivers an HTML e-mail.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends one message and returns a delivery id for logging.
    async fn send(&self, to: &str, subject: &str, html_body: &str)
    -> Result<String, NotificationError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Notifier used when mail is disabled: logs the message and drops it.
#[derive(Debug, Default)]
pub struct LogNotifier {
    sent: AtomicU64,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages "sent" so far.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<String, NotificationError> {
        let n = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(
            recipient = %to,
            subject,
            body_len = html_body.len(),
            "mail disabled, notification logged only"
        );
        Ok(format!("log-{n}"))
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Builds the notifier selected by `config`.
pub fn build_notifier(config: &MailConfig) -> Result<Arc<dyn Notifier>, NotificationError> {
    if config.enabled {
        Ok(Arc::new(SmtpNotifier::new(config)?))
    } else {
        Ok(Arc::new(LogNotifier::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_notifier_counts_messages() {
        let notifier = LogNotifier::new();
        let id = notifier
            .send("student@example.edu", "Hi", "<p>Hi</p>")
            .await
            .unwrap();
        assert_eq!(id, "log-1");
        assert_eq!(notifier.sent(), 1);
    }

    #[test]
    fn disabled_config_builds_log_notifier() {
        let notifier = build_notifier(&MailConfig::default()).unwrap();
        assert_eq!(notifier.name(), "log");
    }

    #[test]
    fn enabled_config_builds_smtp_notifier() {
        let config = MailConfig {
            enabled: true,
            smtp_host: Some("localhost".into()),
            security: crate::config::SmtpSecurity::None,
            ..Default::default()
        };
        assert_eq!(build_notifier(&config).unwrap().name(), "smtp");
    }
}
