//! HTTP middleware: request ID tracking and client identity extraction.

pub mod request_id;

use axum::http::HeaderMap;
use std::net::SocketAddr;

/// Resolves the client identity used for rate limiting.
///
/// `X-Forwarded-For` takes priority (reverse proxy); falls back to the
/// socket address, then to a fixed marker so unidentifiable clients share
/// one bucket instead of escaping the limiter.
pub fn client_identity(headers: &HeaderMap, addr: Option<SocketAddr>) -> String {
    if let Some(xff) = headers.get("x-forwarded-for")
        && let Ok(s) = xff.to_str()
        && let Some(first) = s.split(',').next()
        && !first.trim().is_empty()
    {
        return first.trim().to_owned();
    }
    match addr {
        Some(addr) => addr.ip().to_string(),
        None => "unknown".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_takes_priority() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        assert_eq!(client_identity(&headers, Some(addr)), "203.0.113.9");
    }

    #[test]
    fn falls_back_to_socket_address() {
        let headers = HeaderMap::new();
        let addr: SocketAddr = "192.0.2.4:1234".parse().unwrap();
        assert_eq!(client_identity(&headers, Some(addr)), "192.0.2.4");
    }

    #[test]
    fn unidentifiable_clients_share_one_bucket() {
        let headers = HeaderMap::new();
        assert_eq!(client_identity(&headers, None), "unknown");
    }
}
