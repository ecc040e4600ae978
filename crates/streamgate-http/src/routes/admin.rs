//! Admin endpoints — session introspection, forced disconnect, and
//! rate-limit management.

use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;

use crate::error::ApiError;
use crate::state::AppState;

use streamgate_service::admin::AdminService;
use streamgate_service::types;

/// List every live session.
///
/// Returns id, owning user, ages, queue depth, and handshake state.
#[utoipa::path(
    get,
    path = "/admin/sessions",
    responses(
        (status = 200, description = "Live sessions", body = Vec<types::SessionInfo>),
    ),
    tag = "Admin"
)]
pub async fn list_sessions(State(state): State<AppState>) -> Json<Vec<types::SessionInfo>> {
    Json(AdminService::list_sessions(state.sessions()))
}

/// Get one session's detail, including metadata.
#[utoipa::path(
    get,
    path = "/admin/sessions/{id}",
    params(
        ("id" = String, Path, description = "Session id"),
    ),
    responses(
        (status = 200, description = "Session detail", body = types::SessionDetail),
        (status = 404, description = "Session not found", body = crate::error::ErrorBody),
    ),
    tag = "Admin"
)]
pub async fn session_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<types::SessionDetail>, ApiError> {
    let detail = AdminService::session_detail(state.sessions(), &id)?;
    Ok(Json(detail))
}

/// Forcibly disconnect a session.
///
/// Closes the session's queue (ending its stream) and removes it.
#[utoipa::path(
    delete,
    path = "/admin/sessions/{id}",
    params(
        ("id" = String, Path, description = "Session id"),
    ),
    responses(
        (status = 200, description = "Session removed"),
        (status = 404, description = "Session not found", body = crate::error::ErrorBody),
    ),
    tag = "Admin"
)]
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    AdminService::disconnect_session(state.sessions(), &id)?;
    Ok(Json(serde_json::json!({ "removed": true })))
}

/// Aggregate registry statistics.
#[utoipa::path(
    get,
    path = "/admin/sessions/stats",
    responses(
        (status = 200, description = "Registry statistics", body = types::RegistryStats),
    ),
    tag = "Admin"
)]
pub async fn registry_stats(State(state): State<AppState>) -> Json<types::RegistryStats> {
    Json(AdminService::registry_stats(state.sessions()))
}

/// Per-client rate-limit state.
#[utoipa::path(
    get,
    path = "/admin/rate-limits",
    responses(
        (status = 200, description = "Per-client buckets", body = Vec<types::ClientRateStats>),
    ),
    tag = "Admin"
)]
pub async fn rate_limit_stats(State(state): State<AppState>) -> Json<Vec<types::ClientRateStats>> {
    Json(AdminService::rate_limit_stats(state.limiter()))
}

/// Reset a client's rate limit to full capacity.
#[utoipa::path(
    post,
    path = "/admin/rate-limits/{client}/reset",
    params(
        ("client" = String, Path, description = "Client identity (IP or API key)"),
    ),
    responses(
        (status = 200, description = "Reset result"),
    ),
    tag = "Admin"
)]
pub async fn reset_rate_limit(
    State(state): State<AppState>,
    Path(client): Path<String>,
) -> Json<serde_json::Value> {
    let existed = AdminService::reset_rate_limit(state.limiter(), &client);
    Json(serde_json::json!({ "reset": existed }))
}
