//! Outbound event framing.
//!
//! Each message dequeued by a dispatcher is wrapped as one transport event:
//! `{id?, event, data, retry_ms?}`. Transport adapters encode this into
//! their wire format (the HTTP crate renders SSE frames).

use chrono::Utc;
use serde::Serialize;

/// Reserved event type for keep-alive frames.
pub const HEARTBEAT_EVENT: &str = "heartbeat";

/// Event type used when a payload does not declare one.
pub const DEFAULT_EVENT: &str = "message";

/// Retry interval hint sent with data-bearing events, in milliseconds.
pub const DEFAULT_RETRY_MS: u64 = 3000;

/// One framed server-push event.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OutboundEvent {
    /// Event id, present on data-bearing events for client-side resume.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Event type. Taken from the payload's `type` field when present.
    pub event: String,
    /// Opaque JSON payload.
    pub data: serde_json::Value,
    /// Reconnect-delay hint for the client, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_ms: Option<u64>,
}

impl OutboundEvent {
    /// Frames a queued payload as a data-bearing event.
    pub fn message(data: serde_json::Value) -> Self {
        let event = data
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_EVENT)
            .to_owned();
        Self {
            id: Some(uuid::Uuid::new_v4().to_string()),
            event,
            data,
            retry_ms: Some(DEFAULT_RETRY_MS),
        }
    }

    /// Builds a keep-alive frame with the current timestamp.
    pub fn heartbeat() -> Self {
        Self {
            id: None,
            event: HEARTBEAT_EVENT.to_owned(),
            data: serde_json::json!({
                "type": HEARTBEAT_EVENT,
                "timestamp": Utc::now().to_rfc3339(),
            }),
            retry_ms: None,
        }
    }

    /// Whether this frame is a keep-alive rather than application data.
    pub fn is_heartbeat(&self) -> bool {
        self.event == HEARTBEAT_EVENT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_takes_event_type_from_payload() {
        let ev = OutboundEvent::message(json!({"type": "tool_result", "ok": true}));
        assert_eq!(ev.event, "tool_result");
        assert!(ev.id.is_some());
        assert_eq!(ev.retry_ms, Some(DEFAULT_RETRY_MS));
        assert!(!ev.is_heartbeat());
    }

    #[test]
    fn message_defaults_event_type() {
        let ev = OutboundEvent::message(json!({"text": "hi"}));
        assert_eq!(ev.event, DEFAULT_EVENT);
    }

    #[test]
    fn heartbeat_is_reserved_type_with_timestamp() {
        let ev = OutboundEvent::heartbeat();
        assert!(ev.is_heartbeat());
        assert!(ev.id.is_none());
        assert!(ev.data["timestamp"].is_string());
    }
}
