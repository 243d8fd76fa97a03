//! Bearer token issuing and validation.
//!
//! Tokens are HS256 JWTs signed with the configured secret. The claims carry
//! everything authorization needs, so protected routes never hit the record
//! store to identify the caller.

use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use coursedesk_storage::{RecordId, Role, User};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to encode a token.
    #[error("Failed to encode token: {message}")]
    EncodingError {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode a token.
    #[error("Failed to decode token: {message}")]
    DecodingError {
        /// Description of the decoding error.
        message: String,
    },

    /// The token has expired.
    #[error("Token expired")]
    Expired,

    /// The token signature is invalid.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The token claims are invalid.
    #[error("Invalid claims: {message}")]
    InvalidClaims {
        /// Description of why claims are invalid.
        message: String,
    },
}

impl JwtError {
    /// Creates a new `EncodingError`.
    #[must_use]
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::EncodingError {
            message: message.into(),
        }
    }

    /// Creates a new `DecodingError`.
    #[must_use]
    pub fn decoding_error(message: impl Into<String>) -> Self {
        Self::DecodingError {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClaims` error.
    #[must_use]
    pub fn invalid_claims(message: impl Into<String>) -> Self {
        Self::InvalidClaims {
            message: message.into(),
        }
    }

    /// Returns `true` if the token was rejected (as opposed to failing to encode).
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        !matches!(self, Self::EncodingError { .. })
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::ImmatureSignature
            | ErrorKind::InvalidSubject
            | ErrorKind::MissingRequiredClaim(_) => Self::invalid_claims(err.to_string()),
            _ => Self::decoding_error(err.to_string()),
        }
    }
}

// ============================================================================
// Claims
// ============================================================================

/// Claims embedded in every bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id, as a decimal string.
    pub sub: String,
    pub username: String,
    pub role: Role,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Expiry (Unix seconds).
    pub exp: i64,
}

impl Claims {
    /// Parses the subject back into a record id.
    pub fn user_id(&self) -> Result<RecordId, JwtError> {
        self.sub
            .parse()
            .map_err(|_| JwtError::invalid_claims(format!("subject '{}' is not a user id", self.sub)))
    }
}

// ============================================================================
// Token Service
// ============================================================================

/// Issues and validates HS256 bearer tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl TokenService {
    pub fn new(secret: &str, lifetime: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 5;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifetime,
        }
    }

    /// Lifetime of tokens issued by this service.
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issues a token for `user`.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::EncodingError` if signing fails.
    pub fn issue(&self, user: &User) -> Result<String, JwtError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let lifetime = i64::try_from(self.lifetime.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role,
            iat: now,
            exp: now.saturating_add(lifetime),
        };
        self.encode(&claims)
    }

    /// Signs arbitrary claims.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::EncodingError` if signing fails.
    pub fn encode(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| JwtError::encoding_error(e.to_string()))
    }

    /// Validates a token's signature and expiry and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::Expired`, `JwtError::InvalidSignature` or a decoding
    /// error for anything that is not a valid, current token.
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: 42,
            username: "alice".into(),
            password_hash: String::new(),
            role,
            email: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn issued_token_round_trips_claims() {
        let service = TokenService::new("secret", Duration::from_secs(3600));
        let token = service.issue(&user(Role::Teacher)).unwrap();

        let claims = service.verify(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role, Role::Teacher);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let issuer = TokenService::new("secret-a", Duration::from_secs(60));
        let verifier = TokenService::new("secret-b", Duration::from_secs(60));
        let token = issuer.issue(&user(Role::Student)).unwrap();

        assert!(matches!(
            verifier.verify(&token),
            Err(JwtError::InvalidSignature)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let service = TokenService::new("secret", Duration::from_secs(60));
        let past = OffsetDateTime::now_utc().unix_timestamp() - 3600;
        let token = service
            .encode(&Claims {
                sub: "1".into(),
                username: "bob".into(),
                role: Role::Student,
                iat: past - 60,
                exp: past,
            })
            .unwrap();

        assert!(matches!(service.verify(&token), Err(JwtError::Expired)));
    }

    #[test]
    fn garbage_is_a_validation_error() {
        let service = TokenService::new("secret", Duration::from_secs(60));
        let err = service.verify("not.a.jwt").unwrap_err();
        assert!(err.is_validation_error());
    }
}
