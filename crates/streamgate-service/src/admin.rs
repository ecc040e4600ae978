//! Admin operations — session introspection, forced disconnect, and
//! rate-limit management.
//!
//! Transport-agnostic; the HTTP admin routes are thin wrappers over these.

use crate::adaptive::AdaptiveRateLimiter;
use crate::error::ServiceError;
use crate::session::SessionRegistry;
use crate::types::{ClientRateStats, RegistryStats, SessionDetail, SessionInfo};

/// Stateless admin operations.
pub struct AdminService;

impl AdminService {
    /// Lists every live session.
    pub fn list_sessions(sessions: &SessionRegistry) -> Vec<SessionInfo> {
        sessions.list()
    }

    /// Full view of one session, including metadata.
    pub fn session_detail(
        sessions: &SessionRegistry,
        session_id: &str,
    ) -> Result<SessionDetail, ServiceError> {
        sessions
            .detail(session_id)
            .ok_or(ServiceError::SessionNotFound)
    }

    /// Forcibly disconnects a session: closes its queue (ending the
    /// dispatcher's stream) and removes it from the registry.
    pub fn disconnect_session(
        sessions: &SessionRegistry,
        session_id: &str,
    ) -> Result<(), ServiceError> {
        if sessions.remove(session_id) {
            tracing::info!(session_id, "session disconnected by operator");
            Ok(())
        } else {
            Err(ServiceError::SessionNotFound)
        }
    }

    /// Aggregate registry statistics.
    pub fn registry_stats(sessions: &SessionRegistry) -> RegistryStats {
        sessions.stats()
    }

    /// Per-client rate-limit snapshot.
    pub fn rate_limit_stats(limiter: &AdaptiveRateLimiter) -> Vec<ClientRateStats> {
        limiter.stats()
    }

    /// Restores a client's bucket to full capacity and clears its behavior
    /// profile. Returns whether the client was tracked.
    pub fn reset_rate_limit(limiter: &AdaptiveRateLimiter, client_id: &str) -> bool {
        let existed = limiter.reset(client_id);
        if existed {
            tracing::info!(client_id, "rate limit reset by operator");
        }
        existed
    }
}
