//! Transport-agnostic types shared across the service layer.
//!
//! Introspection DTOs returned by the registry, limiter, and admin
//! operations. No HTTP dependencies.

use std::collections::HashMap;

use serde::Serialize;

/// Summary of one live session, as shown in the admin session list.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SessionInfo {
    pub session_id: String,
    pub user_id: String,
    /// Seconds since the session was created.
    pub age_secs: u64,
    /// Seconds since the session was last touched.
    pub idle_secs: u64,
    pub request_count: u64,
    pub queue_depth: usize,
    pub initialized: bool,
}

/// Full view of one session, including free-form metadata.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SessionDetail {
    #[serde(flatten)]
    pub info: SessionInfo,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Aggregate registry statistics.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RegistryStats {
    pub session_count: usize,
    /// Live session count per user.
    pub sessions_per_user: HashMap<String, usize>,
    pub avg_age_secs: f64,
    /// Messages waiting across all session queues.
    pub queued_messages: usize,
}

/// Per-client rate-limit snapshot.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ClientRateStats {
    pub client_id: String,
    /// Effective bucket capacity (base capacity times the adaptive multiplier).
    pub capacity: f64,
    pub remaining_tokens: f64,
    /// Consumed fraction of the bucket, `0.0` (idle) to `1.0` (exhausted).
    pub utilization: f64,
    /// Adaptive multiplier currently applied to this client.
    pub multiplier: f64,
    /// Seconds until the next token becomes available.
    pub retry_after_secs: f64,
}
