//! Authentication error types.

use coursedesk_storage::KvError;

use crate::token::JwtError;

/// Errors raised while authenticating a caller.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The key-value store holding throttling state failed.
    #[error("Login throttling state unavailable: {0}")]
    Store(#[from] KvError),

    /// Password hashing or verification could not run.
    #[error("Password hashing failed: {message}")]
    Hashing {
        /// Description of the failure.
        message: String,
    },

    /// Token issuing or validation failed.
    #[error(transparent)]
    Token(#[from] JwtError),
}

impl AuthError {
    /// Creates a new `Hashing` error.
    #[must_use]
    pub fn hashing(message: impl Into<String>) -> Self {
        Self::Hashing {
            message: message.into(),
        }
    }
}
