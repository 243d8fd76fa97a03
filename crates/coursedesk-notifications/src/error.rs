use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid address '{address}': {message}")]
    InvalidAddress { address: String, message: String },

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),
}

impl NotificationError {
    #[must_use]
    pub fn invalid_address(address: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            message: message.to_string(),
        }
    }
}
