//! Authentication configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Secret used when none is configured. Only acceptable for local development.
pub const DEVELOPMENT_JWT_SECRET: &str = "coursedesk-development-secret-change-me";

/// Top-level authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret used to sign and verify bearer tokens.
    pub jwt_secret: String,

    /// Lifetime of issued tokens.
    #[serde(with = "humantime_serde")]
    pub token_lifetime: Duration,

    /// Login throttling.
    pub rate_limiting: RateLimitingConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEVELOPMENT_JWT_SECRET.to_string(),
            token_lifetime: Duration::from_secs(24 * 3600),
            rate_limiting: RateLimitingConfig::default(),
        }
    }
}

impl AuthConfig {
    /// Returns `true` while the built-in development secret is in use.
    pub fn uses_development_secret(&self) -> bool {
        self.jwt_secret == DEVELOPMENT_JWT_SECRET
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the secret is empty or any
    /// lifetime, window or threshold is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::InvalidValue(
                "jwt_secret cannot be empty".to_string(),
            ));
        }

        if self.token_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "token_lifetime must be > 0".to_string(),
            ));
        }

        self.rate_limiting.validate()
    }
}

/// Brute-force protection for the login endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitingConfig {
    /// Failed attempts tolerated before the next attempt locks the account.
    pub max_failed_attempts: u32,

    /// How long a lockout lasts.
    #[serde(with = "humantime_serde")]
    pub lockout_duration: Duration,

    /// Inactivity after which the failure counter is forgotten.
    #[serde(with = "humantime_serde")]
    pub failure_window: Duration,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lockout_duration: Duration::from_secs(300), // 5 minutes
            failure_window: Duration::from_secs(900),   // 15 minutes
        }
    }
}

impl RateLimitingConfig {
    /// Validates the throttling settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a zero threshold or duration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_failed_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "max_failed_attempts must be > 0".to_string(),
            ));
        }
        if self.lockout_duration.is_zero() {
            return Err(ConfigError::InvalidValue(
                "lockout_duration must be > 0".to_string(),
            ));
        }
        if self.failure_window.is_zero() {
            return Err(ConfigError::InvalidValue(
                "failure_window must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
