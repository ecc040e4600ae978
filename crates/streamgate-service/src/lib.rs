//! Streamgate Service — session and admission core for the streaming server.
//!
//! This crate contains all transport-agnostic logic: the session registry
//! with its per-session outbound queues, the adaptive token-bucket rate
//! limiter, the per-connection dispatch loop, metrics, and admin
//! operations. Transport crates (`streamgate-http`) depend on this crate
//! and provide protocol-specific adapters.
//!
//! **Zero transport dependencies** — no axum, no wire-protocol code.

pub mod adaptive;
pub mod admin;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod metrics;
pub mod queue;
pub mod rate_limit;
pub mod session;
pub mod types;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use adaptive::AdaptiveRateLimiter;
use dispatch::ConnectionDispatcher;
use error::ServiceError;
use metrics::Metrics;
use rate_limit::RateLimiter;
use session::SessionRegistry;

/// Configuration subset relevant to the service layer.
///
/// Transport-specific config (ports, CORS origins, log formats) stays in
/// the binary crate's `Config` struct.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Maximum concurrent sessions; the oldest is evicted past this.
    pub max_sessions: usize,
    /// Idle time after which the sweep removes a session.
    pub session_timeout: Duration,
    /// Cadence of the session sweep.
    pub cleanup_interval: Duration,
    /// Idle time after which a connection emits a heartbeat frame.
    pub heartbeat_interval: Duration,
    /// Requests allowed per client per window.
    pub rate_limit_requests: u64,
    /// Rate-limit window.
    pub rate_limit_window: Duration,
    /// Lower bound on the adaptive capacity multiplier.
    pub min_multiplier: f64,
    /// Upper bound on the adaptive capacity multiplier.
    pub max_multiplier: f64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_sessions: 1000,
            session_timeout: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(60),
            heartbeat_interval: Duration::from_secs(30),
            rate_limit_requests: 100,
            rate_limit_window: Duration::from_secs(60),
            min_multiplier: 0.5,
            max_multiplier: 2.0,
        }
    }
}

/// Shared service state, cloneable across all transport handlers.
///
/// The explicitly constructed composition root: every component is owned
/// here and passed down by reference — no hidden globals.
#[derive(Clone)]
pub struct ServiceState {
    inner: Arc<Inner>,
}

struct Inner {
    sessions: SessionRegistry,
    limiter: AdaptiveRateLimiter,
    metrics: Arc<Metrics>,
    session_timeout: Duration,
    cleanup_interval: Duration,
    heartbeat_interval: Duration,
    shutdown: CancellationToken,
    start_time: Instant,
}

impl ServiceState {
    /// Creates a new service state from config.
    pub fn new(config: &ServiceConfig) -> Self {
        let metrics = Arc::new(Metrics::new());
        let base = RateLimiter::new(config.rate_limit_requests, config.rate_limit_window);
        Self {
            inner: Arc::new(Inner {
                sessions: SessionRegistry::new(config.max_sessions, Arc::clone(&metrics)),
                limiter: AdaptiveRateLimiter::new(
                    base,
                    config.min_multiplier,
                    config.max_multiplier,
                ),
                metrics,
                session_timeout: config.session_timeout,
                cleanup_interval: config.cleanup_interval,
                heartbeat_interval: config.heartbeat_interval,
                shutdown: CancellationToken::new(),
                start_time: Instant::now(),
            }),
        }
    }

    /// Creates a state with default config (tests and ephemeral use).
    pub fn with_defaults() -> Self {
        Self::new(&ServiceConfig::default())
    }

    /// Creates a state with a specific rate limit (for tests).
    pub fn with_rate_limit(requests: u64, window: Duration) -> Self {
        Self::new(&ServiceConfig {
            rate_limit_requests: requests,
            rate_limit_window: window,
            ..ServiceConfig::default()
        })
    }

    // --- Accessors ---

    pub fn sessions(&self) -> &SessionRegistry {
        &self.inner.sessions
    }

    pub fn limiter(&self) -> &AdaptiveRateLimiter {
        &self.inner.limiter
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    pub fn session_timeout(&self) -> Duration {
        self.inner.session_timeout
    }

    pub fn cleanup_interval(&self) -> Duration {
        self.inner.cleanup_interval
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.inner.heartbeat_interval
    }

    /// Service-wide shutdown token; connections hold children of it.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.start_time.elapsed().as_secs()
    }

    // --- Connection lifecycle ---

    /// Connection accept hook: resolves or creates the session and returns
    /// a dispatcher bound to its queue.
    pub fn open_connection(
        &self,
        user_id: &str,
        session_id: Option<&str>,
    ) -> Result<ConnectionDispatcher, ServiceError> {
        let id = self.inner.sessions.create(user_id, session_id);
        let queue = self
            .inner
            .sessions
            .queue(&id)
            .ok_or(ServiceError::SessionNotFound)?;
        Ok(ConnectionDispatcher::new(
            id,
            queue,
            self.inner.heartbeat_interval,
            self.inner.shutdown.child_token(),
        ))
    }

    /// Control-message submission hook.
    ///
    /// Checks the rate limiter for `client_id` before touching the session;
    /// a denial carries a retry-after hint and never reaches the queue.
    /// Payloads must be JSON objects, and one typed `initialize` completes
    /// the session handshake.
    pub fn submit_message(
        &self,
        session_id: &str,
        client_id: &str,
        payload: serde_json::Value,
    ) -> Result<(), ServiceError> {
        if !self.inner.limiter.allow(client_id) {
            self.inner.metrics.record_rate_limited();
            self.inner.limiter.record_result(client_id, false);
            let retry_after = self.inner.limiter.time_until_next_token(client_id);
            tracing::debug!(client_id, session_id, "control message rate limited");
            return Err(ServiceError::TooManyRequests {
                retry_after_secs: retry_after.as_secs().max(1),
            });
        }

        if !payload.is_object() {
            self.inner.limiter.record_result(client_id, false);
            return Err(ServiceError::BadRequest(
                "payload must be a JSON object".to_owned(),
            ));
        }

        let is_initialize =
            payload.get("type").and_then(|v| v.as_str()) == Some("initialize");

        if !self.inner.sessions.send_to(session_id, payload) {
            self.inner.limiter.record_result(client_id, false);
            return Err(ServiceError::SessionNotFound);
        }
        if is_initialize {
            self.inner.sessions.mark_initialized(session_id);
        }
        self.inner.limiter.record_result(client_id, true);
        self.inner.metrics.record_message_enqueued();
        Ok(())
    }

    // --- Maintenance ---

    /// Removes sessions idle past the configured timeout. Sweep body.
    pub fn cleanup_expired_sessions(&self) -> usize {
        self.inner.sessions.cleanup_expired(self.inner.session_timeout)
    }

    /// Drops idle rate-limit buckets. Sweep body.
    pub fn cleanup_rate_limits(&self) -> usize {
        self.inner.limiter.cleanup()
    }

    /// Cadence for the rate-limit sweep.
    pub fn rate_limit_sweep_interval(&self) -> Duration {
        self.inner.limiter.sweep_interval()
    }

    /// Signals shutdown: cancels every connection's token and closes every
    /// queue so no dispatcher blocks past this call.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.sessions.close_all();
    }
}
