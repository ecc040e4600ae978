//! Control-message submission — the inbound half of the duplex channel.

use std::net::SocketAddr;

use axum::Json;
use axum::extract::rejection::ExtensionRejection;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::HeaderMap;

use crate::error::ApiError;
use crate::middleware::client_identity;
use crate::state::AppState;

/// Submits a control message to a session's outbound queue.
///
/// The rate limiter is consulted before the session is touched; a denial
/// returns 429 with a `Retry-After` hint. Payloads must be JSON objects;
/// one whose `type` is `"initialize"` completes the session handshake.
#[utoipa::path(
    post,
    path = "/sessions/{id}/messages",
    params(
        ("id" = String, Path, description = "Target session id"),
    ),
    responses(
        (status = 200, description = "Message accepted and enqueued"),
        (status = 400, description = "Payload is not a JSON object", body = crate::error::ErrorBody),
        (status = 404, description = "Session not found", body = crate::error::ErrorBody),
        (status = 429, description = "Rate limit exceeded", body = crate::error::ErrorBody),
    ),
    tag = "Messages"
)]
pub async fn submit(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    connect_info: Result<ConnectInfo<SocketAddr>, ExtensionRejection>,
    headers: HeaderMap,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let client_id = client_identity(&headers, connect_info.ok().map(|ci| ci.0));
    state.submit_message(&session_id, &client_id, payload)?;
    Ok(Json(serde_json::json!({ "accepted": true })))
}
