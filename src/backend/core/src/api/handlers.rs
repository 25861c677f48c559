//! Service-level handlers: health, metrics and the API index.
//!
//! All handlers return `Result<impl IntoResponse, HousingError>` where they can
//! fail, so errors are converted to status codes by `HousingError`.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

use super::{ApiResponse, AppState};

// ═══════════════════════════════════════════════════════════════════════════════
// Health Check
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (status, store) = match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "up"),
        Err(e) => {
            tracing::warn!(error = %e, "Identity store health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "down")
        }
    };

    (
        status,
        Json(serde_json::json!({
            "status": if status.is_success() { "healthy" } else { "degraded" },
            "store": store,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// Metrics
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            handle.render(),
        ),
        None => (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            "metrics are disabled\n".to_string(),
        ),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Index
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn index() -> impl IntoResponse {
    Json(ApiResponse::success(serde_json::json!({
        "service": "housing-portal",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}
