//! Event encoding: bridges service-layer frames to SSE wire events.

use axum::response::sse;

use streamgate_service::events::OutboundEvent;

/// Renders one framed event as an SSE wire event.
pub fn sse_event(frame: &OutboundEvent) -> sse::Event {
    let mut event = sse::Event::default()
        .event(&frame.event)
        .data(frame.data.to_string());
    if let Some(id) = &frame.id {
        event = event.id(id);
    }
    if let Some(retry_ms) = frame.retry_ms {
        event = event.retry(std::time::Duration::from_millis(retry_ms));
    }
    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encodes_event_type_and_data() {
        let frame = OutboundEvent::message(json!({"type": "note", "text": "hi"}));
        // Event fields are write-only; rendering must simply not panic and
        // the frame's JSON must be newline-free for SSE data lines.
        let _ = sse_event(&frame);
        assert!(!frame.data.to_string().contains('\n'));
    }

    #[test]
    fn heartbeat_encodes_without_id_or_retry() {
        let frame = OutboundEvent::heartbeat();
        assert!(frame.id.is_none());
        assert!(frame.retry_ms.is_none());
        let _ = sse_event(&frame);
    }
}
