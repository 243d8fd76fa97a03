//! Authentication building blocks for Coursedesk.
//!
//! - [`password`]: Argon2id hashing and verification off the async runtime.
//! - [`token`]: HS256 bearer tokens carrying the caller's id, username and role.
//! - [`guard`]: the per-username login attempt guard (brute-force lockout).

pub mod config;
pub mod error;
pub mod guard;
pub mod password;
pub mod token;

pub use config::{AuthConfig, ConfigError, RateLimitingConfig};
pub use error::AuthError;
pub use guard::{AttemptStatus, LoginAttemptGuard};
pub use token::{Claims, JwtError, TokenService};
