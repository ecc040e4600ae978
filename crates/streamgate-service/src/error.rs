//! Service-layer error types.
//!
//! `ServiceError` is transport-agnostic. The HTTP crate maps it to status
//! codes; these are the only conditions a remote client ever observes
//! directly.

/// Service error shared across all transports.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Malformed request payload.
    #[error("{0}")]
    BadRequest(String),

    /// Session not found or already removed.
    #[error("session not found")]
    SessionNotFound,

    /// Rate limit exceeded; carries a retry-after hint in seconds.
    #[error("too many requests")]
    TooManyRequests { retry_after_secs: u64 },
}
