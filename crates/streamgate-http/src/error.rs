//! Error types for the HTTP API layer.
//!
//! `ApiError` maps `ServiceError` onto status codes and JSON error bodies.
//! Rate-limit denials carry a `Retry-After` header so clients can back off.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use streamgate_service::error::ServiceError;

/// HTTP API error.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed request.
    #[error("{0}")]
    BadRequest(String),

    /// Session not found or already removed.
    #[error("session not found")]
    SessionNotFound,

    /// Rate limit exceeded; retry after the given number of seconds.
    #[error("too many requests")]
    TooManyRequests { retry_after_secs: u64 },
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::BadRequest(msg) => Self::BadRequest(msg),
            ServiceError::SessionNotFound => Self::SessionNotFound,
            ServiceError::TooManyRequests { retry_after_secs } => {
                Self::TooManyRequests { retry_after_secs }
            }
        }
    }
}

/// JSON body returned with every error response.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    /// Error code (e.g. "session_not_found", "too_many_requests").
    pub(crate) error: String,
    /// Human-readable error detail, if available.
    pub(crate) detail: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, detail) = match &self {
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            ApiError::SessionNotFound => (StatusCode::NOT_FOUND, "session_not_found", None),
            ApiError::TooManyRequests { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, "too_many_requests", None)
            }
        };

        let body = ErrorBody {
            error: error.to_string(),
            detail,
        };

        let mut response = (status, axum::Json(body)).into_response();
        if let ApiError::TooManyRequests { retry_after_secs } = self
            && let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}
