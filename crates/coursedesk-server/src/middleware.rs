use std::time::Instant;

use axum::{
    body::Body,
    extract::{FromRequestParts, MatchedPath, State},
    http::{HeaderName, HeaderValue, Request, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use coursedesk_storage::{RecordId, Role};

use crate::error::ApiError;
use crate::metrics;
use crate::server::AppState;

// =============================================================================
// Authentication
// =============================================================================

/// The caller identified by a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: RecordId,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    /// Rejects callers without `role` with 403.
    pub fn require_role(&self, role: Role) -> Result<(), ApiError> {
        if self.role == role {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!("Forbidden: requires {role} role")))
        }
    }

    /// Rejects teachers who do not own the assignment with 403.
    pub fn require_owner(&self, teacher_id: RecordId) -> Result<(), ApiError> {
        self.require_role(Role::Teacher)?;
        if self.id == teacher_id {
            Ok(())
        } else {
            Err(ApiError::forbidden(
                "Forbidden: you do not own this assignment",
            ))
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Validates the `Authorization: Bearer` header and stores the [`AuthUser`]
/// in request extensions. Missing or invalid tokens get 401.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let header = match req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        Some(header) => header,
        None => {
            tracing::debug!(path = %req.uri().path(), "No Authorization header");
            return ApiError::unauthorized("Authentication required").into_response();
        }
    };

    let token = match header.strip_prefix("Bearer ") {
        Some(t) if !t.trim().is_empty() => t.trim(),
        _ => {
            return ApiError::unauthorized("Invalid Authorization header format").into_response();
        }
    };

    let claims = match state.tokens.verify(token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!(error = %e, "Token validation failed");
            return ApiError::from(e).into_response();
        }
    };

    let id = match claims.user_id() {
        Ok(id) => id,
        Err(e) => return ApiError::from(e).into_response(),
    };

    req.extensions_mut().insert(AuthUser {
        id,
        username: claims.username,
        role: claims.role,
    });
    next.run(req).await
}

// =============================================================================
// Key-value store gate
// =============================================================================

/// Refuses API requests with 503 while the key-value store is unreachable.
pub async fn require_kv_connected(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !state.kv.is_connected().await {
        tracing::warn!(
            backend = state.kv.backend_name(),
            path = %req.uri().path(),
            "key-value store not connected, rejecting request"
        );
        return ApiError::ServiceUnavailable(
            "Service unavailable: key-value store not connected".into(),
        )
        .into_response();
    }
    next.run(req).await
}

// =============================================================================
// Other Middleware
// =============================================================================

// Ensures each request has an X-Request-Id and mirrors it on the response
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static("x-request-id");

    let req_id_value = req
        .headers()
        .get(&header_name)
        .cloned()
        .or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).ok())
        .unwrap_or_else(|| HeaderValue::from_static("unknown"));

    req.extensions_mut().insert(req_id_value.clone());

    let mut res = next.run(req).await;
    res.headers_mut().insert(header_name, req_id_value);
    res
}

// Records request count and latency per matched route
pub async fn track_metrics(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());

    let res = next.run(req).await;

    metrics::record_http_request(
        method.as_str(),
        &route,
        res.status().as_u16(),
        start.elapsed(),
    );
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    fn teacher(id: RecordId) -> AuthUser {
        AuthUser {
            id,
            username: "t".into(),
            role: Role::Teacher,
        }
    }

    #[test]
    fn role_gate() {
        let student = AuthUser {
            id: 1,
            username: "s".into(),
            role: Role::Student,
        };
        assert!(student.require_role(Role::Student).is_ok());
        let err = student.require_role(Role::Teacher).unwrap_err();
        assert_eq!(err.to_string(), "Forbidden: requires teacher role");
    }

    #[test]
    fn ownership_gate() {
        assert!(teacher(3).require_owner(3).is_ok());
        assert!(matches!(
            teacher(3).require_owner(4),
            Err(ApiError::Forbidden(_))
        ));
    }
}
