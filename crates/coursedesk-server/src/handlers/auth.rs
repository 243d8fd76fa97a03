use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;

use coursedesk_auth::password::{hash_password, verify_password};
use coursedesk_storage::{NewUser, Role};

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::metrics;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub email: Option<String>,
}

impl RegisterRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.username.trim().is_empty() {
            return Err(ApiError::bad_request("username is required"));
        }
        if self.password.is_empty() {
            return Err(ApiError::bad_request("password is required"));
        }
        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(ApiError::bad_request("email is not a valid address"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let username = req.username.trim().to_string();
    let role = req.role.unwrap_or(Role::Student);
    let password_hash = hash_password(req.password).await?;

    let user = state
        .records
        .create_user(NewUser {
            username,
            password_hash,
            role,
            email: req.email,
        })
        .await?;

    tracing::info!(user_id = user.id, username = %user.username, role = %user.role, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User registered successfully" })),
    ))
}

/// Checks the lockout state before touching credentials. Unknown usernames
/// are verified against a dummy hash and count as failures. Usernames are
/// trimmed the same way `register` stores them.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim();
    let status = state.guard.check(username).await?;
    if status.is_locked() {
        metrics::record_login_locked();
        return Err(ApiError::RateLimited);
    }

    let user = state.records.find_user_by_username(username).await?;
    let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
    let valid = verify_password(req.password, stored_hash).await?;

    match user {
        Some(user) if valid => {
            state.guard.record_success(username).await?;
            let token = state.tokens.issue(&user)?;
            tracing::info!(user_id = user.id, username = %user.username, "login succeeded");
            Ok(Json(json!({ "token": token })))
        }
        _ => {
            let failures = state.guard.record_failure(username).await?;
            metrics::record_login_failure();
            tracing::info!(username, failures, "login failed");
            Err(ApiError::unauthorized("Invalid credentials"))
        }
    }
}
