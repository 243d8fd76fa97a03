//! Argon2id password hashing.
//!
//! Hashing is CPU-bound and deliberately slow, so the async entry points run
//! it on Tokio's blocking pool instead of a runtime worker.
//!
//! ```ignore
//! let hash = hash_password("correct horse".into()).await?;
//! assert!(verify_password("correct horse".into(), hash).await?);
//! ```

use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::AuthError;

/// Hash verified when the username is unknown, so that both failure paths
/// cost one Argon2 verification.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password_blocking("coursedesk-dummy-password").ok());

/// Hashes a password into a PHC string. Blocking.
pub fn hash_password_blocking(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verifies a password against a PHC string. Blocking.
///
/// Returns `Ok(false)` on mismatch and `Err` only for a malformed hash.
pub fn verify_password_blocking(
    password: &str,
    hash: &str,
) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    let result = Argon2::default().verify_password(password.as_bytes(), &parsed_hash);
    Ok(result.is_ok())
}

/// Hashes a password on the blocking pool.
///
/// # Errors
///
/// Returns `AuthError::Hashing` if hashing fails or the task panics.
pub async fn hash_password(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password_blocking(&password))
        .await
        .map_err(|e| AuthError::hashing(format!("hashing task failed: {e}")))?
        .map_err(|e| AuthError::hashing(e.to_string()))
}

/// Verifies a password on the blocking pool.
///
/// With `stored_hash = None` (unknown user) the password is checked against a
/// fixed dummy hash and the result is always `false`.
///
/// # Errors
///
/// Returns `AuthError::Hashing` if the stored hash is malformed or the task panics.
pub async fn verify_password(
    password: String,
    stored_hash: Option<String>,
) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || match stored_hash {
        Some(hash) => verify_password_blocking(&password, &hash),
        None => {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = verify_password_blocking(&password, dummy);
            }
            Ok(false)
        }
    })
    .await
    .map_err(|e| AuthError::hashing(format!("verification task failed: {e}")))?
    .map_err(|e| AuthError::hashing(e.to_string()))
}
