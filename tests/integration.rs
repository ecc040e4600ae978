//! Integration tests for the Streamgate HTTP API.
//!
//! Each test starts an in-memory server on an ephemeral port and uses reqwest
//! to exercise the endpoints, including the SSE stream.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use streamgate_http::AppState;
use streamgate_service::ServiceConfig;

/// Boots an in-memory Streamgate server on an OS-assigned port.
/// Returns the base URL (e.g. "http://127.0.0.1:12345").
async fn spawn_server_with(config: ServiceConfig) -> String {
    let state = AppState::with_config(&config);
    let app = streamgate_http::router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();

    tokio::spawn(streamgate_http::serve(
        listener,
        app,
        std::future::pending(),
    ));

    format!("http://{addr}")
}

async fn spawn_server() -> String {
    spawn_server_with(ServiceConfig::default()).await
}

/// Reads SSE frames off a reqwest byte stream, one `data:` payload at a time.
struct SseReader {
    stream: std::pin::Pin<Box<dyn futures_util::Stream<Item = reqwest::Result<bytes::Bytes>> + Send>>,
    buffer: String,
}

impl SseReader {
    fn new(resp: reqwest::Response) -> Self {
        Self {
            stream: Box::pin(resp.bytes_stream()),
            buffer: String::new(),
        }
    }

    /// Returns the next complete event as (event_name, data), or None at EOF.
    async fn next_event(&mut self) -> Option<(String, Value)> {
        loop {
            if let Some(pos) = self.buffer.find("\n\n") {
                let block: String = self.buffer.drain(..pos + 2).collect();
                let mut event = "message".to_owned();
                let mut data = String::new();
                for line in block.lines() {
                    if let Some(rest) = line.strip_prefix("event:") {
                        event = rest.trim().to_owned();
                    } else if let Some(rest) = line.strip_prefix("data:") {
                        data.push_str(rest.trim_start());
                    }
                }
                if data.is_empty() {
                    continue;
                }
                let value = serde_json::from_str(&data).unwrap_or(Value::String(data));
                return Some((event, value));
            }

            let chunk = self.stream.next().await?.ok()?;
            self.buffer.push_str(std::str::from_utf8(&chunk).unwrap());
        }
    }
}

/// Opens the SSE stream and consumes the initial `session` hello frame.
/// Returns the reader (keep it alive: dropping it disconnects the session)
/// and the announced session id.
async fn connect_stream(base: &str, client: &Client, query: &str) -> (SseReader, String) {
    let resp = client
        .get(format!("{base}/events{query}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(
        resp.headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let mut reader = SseReader::new(resp);
    let (event, data) = reader.next_event().await.expect("missing hello frame");
    assert_eq!(event, "session");
    let session_id = data["session_id"].as_str().unwrap().to_owned();
    (reader, session_id)
}

// ---------------------------------------------------------------------------
// Health and middleware
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_ok() {
    let base = spawn_server().await;
    let client = Client::new();

    let resp = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["active_sessions"], 0);
    assert!(body["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn request_id_generated_when_absent() {
    let base = spawn_server().await;
    let client = Client::new();

    let resp = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let request_id = resp
        .headers()
        .get("x-request-id")
        .expect("missing x-request-id");
    // Should be a valid UUID v4
    assert_eq!(request_id.to_str().unwrap().len(), 36);
}

#[tokio::test]
async fn request_id_preserved_when_provided() {
    let base = spawn_server().await;
    let client = Client::new();

    let resp = client
        .get(format!("{base}/health"))
        .header("x-request-id", "my-custom-id-123")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let request_id = resp
        .headers()
        .get("x-request-id")
        .expect("missing x-request-id");
    assert_eq!(request_id.to_str().unwrap(), "my-custom-id-123");
}

// ---------------------------------------------------------------------------
// Message submission and admission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_to_missing_session_returns_404() {
    let base = spawn_server().await;
    let client = Client::new();

    let resp = client
        .post(format!("{base}/sessions/ghost/messages"))
        .json(&json!({"type": "ping"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "session_not_found");
}

#[tokio::test]
async fn submit_rejects_non_object_payload() {
    let base = spawn_server().await;
    let client = Client::new();

    let (_reader, session_id) = connect_stream(&base, &client, "?session_id=s1").await;

    let resp = client
        .post(format!("{base}/sessions/{session_id}/messages"))
        .json(&json!("just a string"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn rate_limit_rejects_with_retry_after() {
    let base = spawn_server_with(ServiceConfig {
        rate_limit_requests: 3,
        rate_limit_window: Duration::from_secs(60),
        // Keep the adaptive layer neutral so exactly 3 requests pass.
        min_multiplier: 1.0,
        max_multiplier: 1.0,
        ..ServiceConfig::default()
    })
    .await;
    let client = Client::new();

    // Admission happens before session lookup: a missing session still
    // consumes a token, so repeated 404s eventually become 429.
    for _ in 0..3 {
        let resp = client
            .post(format!("{base}/sessions/ghost/messages"))
            .json(&json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }

    let resp = client
        .post(format!("{base}/sessions/ghost/messages"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 429);

    let retry_after = resp
        .headers()
        .get("retry-after")
        .expect("missing retry-after");
    assert!(retry_after.to_str().unwrap().parse::<u64>().unwrap() >= 1);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "too_many_requests");
}

// ---------------------------------------------------------------------------
// SSE streaming
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sse_stream_delivers_submitted_messages() {
    let base = spawn_server().await;
    let client = Client::new();

    let (mut reader, session_id) =
        connect_stream(&base, &client, "?user_id=u1&session_id=s1").await;
    assert_eq!(session_id, "s1");

    let resp = client
        .post(format!("{base}/sessions/s1/messages"))
        .json(&json!({"type": "chat", "text": "hello"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["accepted"], true);

    let (event, data) = reader.next_event().await.expect("stream ended early");
    assert_eq!(event, "chat");
    assert_eq!(data["text"], "hello");
}

#[tokio::test]
async fn sse_stream_emits_heartbeats_when_idle() {
    let base = spawn_server_with(ServiceConfig {
        heartbeat_interval: Duration::from_millis(200),
        ..ServiceConfig::default()
    })
    .await;
    let client = Client::new();

    let (mut reader, _) = connect_stream(&base, &client, "?user_id=u1").await;

    let (event, data) = tokio::time::timeout(Duration::from_secs(5), reader.next_event())
        .await
        .expect("no heartbeat within 5s")
        .expect("stream ended early");
    assert_eq!(event, "heartbeat");
    assert!(data["timestamp"].is_string());
}

#[tokio::test]
async fn generated_session_id_is_usable_for_submission() {
    let base = spawn_server().await;
    let client = Client::new();

    let (mut reader, session_id) = connect_stream(&base, &client, "").await;
    assert!(!session_id.is_empty());

    let resp = client
        .post(format!("{base}/sessions/{session_id}/messages"))
        .json(&json!({"type": "initialize"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let (event, data) = reader.next_event().await.expect("stream ended early");
    assert_eq!(event, "initialize");
    assert_eq!(data["type"], "initialize");
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

#[tokio::test]
async fn admin_session_lifecycle() {
    let base = spawn_server().await;
    let client = Client::new();

    // Keep the reader alive; dropping it disconnects the session.
    let (_reader, session_id) =
        connect_stream(&base, &client, "?user_id=alice&session_id=s-admin").await;
    assert_eq!(session_id, "s-admin");

    let resp = client
        .get(format!("{base}/admin/sessions"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let sessions: Value = resp.json().await.unwrap();
    let list = sessions.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["session_id"], "s-admin");
    assert_eq!(list[0]["user_id"], "alice");

    let resp = client
        .get(format!("{base}/admin/sessions/s-admin"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let detail: Value = resp.json().await.unwrap();
    assert_eq!(detail["session_id"], "s-admin");
    assert_eq!(detail["initialized"], false);

    let resp = client
        .get(format!("{base}/admin/sessions/stats"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let stats: Value = resp.json().await.unwrap();
    assert_eq!(stats["session_count"], 1);
    assert_eq!(stats["sessions_per_user"]["alice"], 1);

    let resp = client
        .delete(format!("{base}/admin/sessions/s-admin"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["removed"], true);

    let resp = client
        .get(format!("{base}/admin/sessions/s-admin"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn admin_rate_limit_stats_and_reset() {
    let base = spawn_server().await;
    let client = Client::new();

    let (_reader, session_id) = connect_stream(&base, &client, "?session_id=s1").await;
    client
        .post(format!("{base}/sessions/{session_id}/messages"))
        .json(&json!({"type": "ping"}))
        .send()
        .await
        .unwrap();

    let resp = client
        .get(format!("{base}/admin/rate-limits"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let stats: Value = resp.json().await.unwrap();
    let clients = stats.as_array().unwrap();
    assert_eq!(clients.len(), 1);
    let client_id = clients[0]["client_id"].as_str().unwrap().to_owned();
    assert!(clients[0]["utilization"].as_f64().unwrap() > 0.0);

    let resp = client
        .post(format!("{base}/admin/rate-limits/{client_id}/reset"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["reset"], true);

    // Resetting an unknown client reports false.
    let resp = client
        .post(format!("{base}/admin/rate-limits/no-such-client/reset"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["reset"], false);
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn metrics_exposes_prometheus_text() {
    let base = spawn_server().await;
    let client = Client::new();

    let (_reader, session_id) = connect_stream(&base, &client, "?session_id=s1").await;
    client
        .post(format!("{base}/sessions/{session_id}/messages"))
        .json(&json!({"type": "ping"}))
        .send()
        .await
        .unwrap();

    let resp = client.get(format!("{base}/metrics")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let text = resp.text().await.unwrap();

    assert!(text.contains("streamgate_active_sessions 1"));
    assert!(text.contains("streamgate_sessions_created_total 1"));
    assert!(text.contains("streamgate_messages_enqueued_total 1"));
    assert!(text.contains("streamgate_uptime_seconds"));
}
