//! Mail delivery configuration.

use serde::{Deserialize, Serialize};

use crate::error::NotificationError;

/// Transport security for the SMTP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Plain connection. Only for local relays such as MailHog.
    None,
    /// Upgrade with STARTTLS (submission port 587).
    #[default]
    Starttls,
    /// Implicit TLS (port 465).
    Tls,
}

/// Outbound mail settings. With `enabled = false` messages are only logged.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MailConfig {
    pub enabled: bool,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub security: SmtpSecurity,
    /// Sender mailbox, e.g. `Coursedesk <no-reply@example.edu>`.
    pub from: String,
    /// SMTP command timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            security: SmtpSecurity::default(),
            from: "Coursedesk <no-reply@coursedesk.local>".to_string(),
            timeout_secs: 10,
        }
    }
}

impl MailConfig {
    /// Checks that an enabled mailer has everything it needs.
    pub fn validate(&self) -> Result<(), NotificationError> {
        if !self.enabled {
            return Ok(());
        }
        if self.smtp_host.as_deref().is_none_or(str::is_empty) {
            return Err(NotificationError::InvalidConfig(
                "mail.smtp_host is required when mail is enabled".into(),
            ));
        }
        if self.smtp_username.is_some() != self.smtp_password.is_some() {
            return Err(NotificationError::InvalidConfig(
                "mail.smtp_username and mail.smtp_password must be set together".into(),
            ));
        }
        self.from
            .parse::<lettre::message::Mailbox>()
            .map_err(|e| NotificationError::invalid_address(&self.from, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_mail_is_always_valid() {
        assert!(MailConfig::default().validate().is_ok());
    }

    #[test]
    fn enabled_mail_needs_a_host() {
        let config = MailConfig {
            enabled: true,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(NotificationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn credentials_come_in_pairs() {
        let config = MailConfig {
            enabled: true,
            smtp_host: Some("smtp.example.edu".into()),
            smtp_username: Some("mailer".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_sender_is_rejected() {
        let config = MailConfig {
            enabled: true,
            smtp_host: Some("smtp.example.edu".into()),
            from: "not an address".into(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(NotificationError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn security_deserializes_lowercase() {
        let config: MailConfig =
            serde_json::from_str(r#"{"enabled":true,"security":"tls","smtp_port":465}"#).unwrap();
        assert_eq!(config.security, SmtpSecurity::Tls);
        assert_eq!(config.smtp_port, 465);
        assert_eq!(config.timeout_secs, 10);
    }
}
