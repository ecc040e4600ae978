//! Request correlation: tags every request with an `x-request-id`.
//!
//! The id is preserved from the client when present (and non-empty),
//! generated otherwise, echoed on the response, and attached to a tracing
//! span so stream opens, submissions, and admin calls correlate in logs.

use axum::extract::Request;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;
use uuid::Uuid;

pub(crate) const REQUEST_ID_HEADER: &str = "x-request-id";

pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let header = HeaderName::from_static(REQUEST_ID_HEADER);
    let request_id =
        incoming_id(req.headers()).unwrap_or_else(|| Uuid::new_v4().to_string());

    // Client-supplied ids passed `to_str` above and generated ones are
    // UUIDs, so this parse only fails on a forged non-ASCII header.
    let Ok(value) = HeaderValue::from_str(&request_id) else {
        return next.run(req).await;
    };

    req.headers_mut().insert(header.clone(), value.clone());
    let span = tracing::info_span!("request", request_id = %request_id);
    let mut response = next.run(req).instrument(span).await;
    response.headers_mut().insert(header, value);
    response
}

/// The client's correlation id, if it sent a usable one.
fn incoming_id(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(REQUEST_ID_HEADER)?.to_str().ok()?;
    if value.is_empty() {
        None
    } else {
        Some(value.to_owned())
    }
}
