use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::json;

use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
struct DependencyStatus {
    backend: &'static str,
    status: &'static str,
}

#[derive(Serialize)]
struct ReadinessResponse {
    status: &'static str,
    kv: DependencyStatus,
    records: DependencyStatus,
}

pub async fn root() -> impl IntoResponse {
    let body = json!({
        "service": "Coursedesk",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(body))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// Ready only while both the key-value store and the record store answer.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let kv_up = state.kv.is_connected().await;
    let records_up = match state.records.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "record store ping failed");
            false
        }
    };

    let label = |up: bool| if up { "up" } else { "down" };
    let ready = kv_up && records_up;
    let body = ReadinessResponse {
        status: if ready { "ready" } else { "not_ready" },
        kv: DependencyStatus {
            backend: state.kv.backend_name(),
            status: label(kv_up),
        },
        records: DependencyStatus {
            backend: state.records.backend_name(),
            status: label(records_up),
        },
    };
    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body))
}

/// Prometheus text exposition.
pub async fn metrics() -> impl IntoResponse {
    match crate::metrics::render_metrics() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed",
        )
            .into_response(),
    }
}
