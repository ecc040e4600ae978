//! System and health endpoints.

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Health probe body.
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub active_sessions: usize,
    pub queued_messages: usize,
}

/// Service health and liveness.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse),
    ),
    tag = "System"
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_secs(),
        active_sessions: state.sessions().count(),
        queued_messages: state.sessions().queued_messages(),
    })
}

/// Prometheus metrics in text exposition format.
pub async fn metrics_endpoint(State(state): State<AppState>) -> String {
    state.metrics().render(
        state.sessions().count(),
        state.sessions().queued_messages(),
        state.limiter().tracked_clients(),
        state.uptime_secs(),
    )
}
