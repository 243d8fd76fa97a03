//! Login attempt guard.
//!
//! Per-username brute-force protection kept in the shared key-value store, so
//! every server instance sees the same state:
//!
//! - `login_attempts:{username}` counts consecutive failures. It is created by
//!   the first failure, bumped atomically, re-armed to the failure window on
//!   every bump and deleted on success or when a lockout is written.
//! - `lockout:{username}` is a presence-only flag with a fixed expiry. While it
//!   exists every attempt is refused before the password is looked at.
//!
//! A failure counter that has reached the threshold locks the account on the
//! *next* attempt, which is refused even when it carries the right password.
//! `check` is not atomic with respect to concurrent attempts; a race can only
//! let an extra attempt through before the lock lands.

use std::sync::Arc;

use tracing::{debug, warn};

use coursedesk_storage::{KeyValueStore, KvError};

use crate::config::RateLimitingConfig;
use crate::error::AuthError;

/// Key of the failure counter for `username`.
pub fn attempts_key(username: &str) -> String {
    format!("login_attempts:{username}")
}

/// Key of the lockout flag for `username`.
pub fn lockout_key(username: &str) -> String {
    format!("lockout:{username}")
}

/// Outcome of [`LoginAttemptGuard::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    /// Credentials may be checked. Carries the failures recorded so far.
    Allowed { failures: i64 },
    /// The username is locked out.
    Locked,
}

impl AttemptStatus {
    pub fn is_locked(&self) -> bool {
        matches!(self, AttemptStatus::Locked)
    }
}

/// Gates login attempts per username.
#[derive(Clone)]
pub struct LoginAttemptGuard {
    store: Arc<dyn KeyValueStore>,
    config: RateLimitingConfig,
}

impl LoginAttemptGuard {
    pub fn new(store: Arc<dyn KeyValueStore>, config: RateLimitingConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RateLimitingConfig {
        &self.config
    }

    /// Decides whether an attempt for `username` may proceed.
    ///
    /// Writes the lockout flag (and drops the counter) when the counter has
    /// reached the threshold.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Store` if the store cannot be read or written. The
    /// caller must refuse the attempt in that case.
    pub async fn check(&self, username: &str) -> Result<AttemptStatus, AuthError> {
        let lockout_key = lockout_key(username);
        if self.store.exists(&lockout_key).await? {
            debug!(username, "login attempt refused, account locked");
            return Ok(AttemptStatus::Locked);
        }

        let attempts_key = attempts_key(username);
        let failures = self.failures(&attempts_key).await?;

        if failures >= i64::from(self.config.max_failed_attempts) {
            self.store
                .set(&lockout_key, b"1", self.config.lockout_duration)
                .await?;
            self.store.delete(&attempts_key).await?;
            warn!(
                username,
                failures,
                lockout_secs = self.config.lockout_duration.as_secs(),
                "account locked after repeated login failures"
            );
            return Ok(AttemptStatus::Locked);
        }

        Ok(AttemptStatus::Allowed { failures })
    }

    /// Records a failed attempt and returns the new failure count.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Store` if the counter cannot be incremented.
    pub async fn record_failure(&self, username: &str) -> Result<i64, AuthError> {
        let failures = self
            .store
            .increment(&attempts_key(username), self.config.failure_window)
            .await?;
        debug!(username, failures, "login failure recorded");
        Ok(failures)
    }

    /// Clears the failure counter after a successful login.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Store` if the counter cannot be deleted.
    pub async fn record_success(&self, username: &str) -> Result<(), AuthError> {
        self.store.delete(&attempts_key(username)).await?;
        Ok(())
    }

    async fn failures(&self, key: &str) -> Result<i64, AuthError> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(0);
        };
        std::str::from_utf8(&raw)
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .ok_or_else(|| AuthError::Store(KvError::wrong_type(key)))
    }
}

impl std::fmt::Debug for LoginAttemptGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginAttemptGuard")
            .field("backend", &self.store.backend_name())
            .field("config", &self.config)
            .finish()
    }
}
