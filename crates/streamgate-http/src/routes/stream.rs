//! SSE stream endpoint — the connection accept hook.
//!
//! Each `GET /events` resolves (or creates) a session and streams its
//! outbound queue as SSE frames, heartbeats interleaved, until the peer
//! disconnects or the server shuts down. The first frame is a `session`
//! event announcing the session id so the client can submit control
//! messages against it.

use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::response::sse::{Event, Sse};
use futures_util::Stream;
use serde::Deserialize;

use streamgate_service::events::{DEFAULT_RETRY_MS, OutboundEvent};

use crate::encode;
use crate::error::ApiError;
use crate::state::AppState;

/// Query parameters accepted on the stream endpoint.
#[derive(Debug, Deserialize)]
pub struct StreamParams {
    /// Owning user identity; anonymous connections share a user bucket.
    pub user_id: Option<String>,
    /// Existing session to re-attach to; generated when absent.
    pub session_id: Option<String>,
}

/// Removes the session when the SSE body is dropped.
///
/// Hyper drops the body stream on peer disconnect or write failure, so this
/// is the disconnect signal: removal is fatal to this connection only. The
/// guard is built before the body stream so a response dropped before its
/// first poll still tears the session down.
struct ConnectionGuard {
    state: AppState,
    session_id: String,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.state.sessions().remove(&self.session_id) {
            tracing::info!(session_id = %self.session_id, "client disconnected");
        }
    }
}

/// Opens the server-push stream for one client.
pub async fn events(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let user_id = params.user_id.unwrap_or_else(|| "anonymous".to_owned());
    let mut dispatcher = state.open_connection(&user_id, params.session_id.as_deref())?;
    let session_id = dispatcher.session_id().to_owned();
    tracing::info!(%session_id, %user_id, "client connected");

    let guard = ConnectionGuard {
        state: state.clone(),
        session_id: session_id.clone(),
    };

    let stream = async_stream::stream! {
        let hello = OutboundEvent {
            id: None,
            event: "session".to_owned(),
            data: serde_json::json!({ "session_id": guard.session_id }),
            retry_ms: Some(DEFAULT_RETRY_MS),
        };
        yield Ok(encode::sse_event(&hello));

        while let Some(frame) = dispatcher.next_event().await {
            if frame.is_heartbeat() {
                state.metrics().record_heartbeat_sent();
            } else {
                state.metrics().record_event_sent();
            }
            yield Ok(encode::sse_event(&frame));
        }
    };

    Ok(Sse::new(stream))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropping_unpolled_response_removes_the_session() {
        let state = AppState::new_in_memory();
        let response = events(
            axum::extract::State(state.clone()),
            axum::extract::Query(StreamParams {
                user_id: Some("u1".to_owned()),
                session_id: Some("s1".to_owned()),
            }),
        )
        .await
        .unwrap();

        assert_eq!(state.sessions().count(), 1);
        drop(response);
        assert_eq!(state.sessions().count(), 0);
    }
}
