//! Per-client admission control with lazily refilled token buckets.
//!
//! Transport-agnostic core. The HTTP crate extracts a client identity
//! (forwarded-for header or socket address) and calls [`RateLimiter::allow`]
//! before admitting a control message.
//!
//! Buckets refill on check rather than on a timer: accounting stays exact
//! regardless of scheduling jitter, and idle clients cost nothing until the
//! periodic sweep drops them.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::types::ClientRateStats;

/// Buckets at least this full count as idle for the cleanup sweep.
const SWEEP_FULLNESS: f64 = 0.9;

/// Floor for the sweep cadence, per [`RateLimiter::sweep_interval`].
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Per-client quota state: pure data plus refill arithmetic.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_rate: f64,
    last_refill: Instant,
    last_touch: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, window: Duration) -> Self {
        let now = Instant::now();
        Self {
            capacity,
            tokens: capacity,
            refill_rate: capacity / window.as_secs_f64().max(f64::EPSILON),
            last_refill: now,
            last_touch: now,
        }
    }

    /// Credits tokens for time elapsed since the last refill, capped at
    /// capacity.
    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Consumes `cost` tokens if available. Refill must have run first.
    fn try_consume(&mut self, cost: f64) -> bool {
        if self.tokens >= cost {
            self.tokens -= cost;
            true
        } else {
            false
        }
    }

    /// Resizes the bucket. On growth, tokens scale proportionally so a
    /// half-full bucket stays half-full; on shrink, tokens clamp to the new
    /// capacity (already-spent tokens are never refunded).
    fn resize(&mut self, new_capacity: f64) {
        let window = self.window_secs();
        if new_capacity > self.capacity {
            let ratio = new_capacity / self.capacity.max(f64::EPSILON);
            self.tokens = (self.tokens * ratio).min(new_capacity);
        } else {
            self.tokens = self.tokens.min(new_capacity);
        }
        self.capacity = new_capacity;
        self.refill_rate = new_capacity / window.max(f64::EPSILON);
    }

    fn window_secs(&self) -> f64 {
        if self.refill_rate <= 0.0 {
            1.0
        } else {
            self.capacity / self.refill_rate
        }
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    /// Consumed fraction of the bucket, `0.0` (full) to `1.0` (empty).
    pub fn utilization(&self) -> f64 {
        if self.capacity <= 0.0 {
            0.0
        } else {
            1.0 - self.tokens / self.capacity
        }
    }

    /// Time until one whole token is available. Zero when one already is.
    pub fn time_until_next_token(&self) -> Duration {
        if self.tokens >= 1.0 || self.refill_rate <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64((1.0 - self.tokens) / self.refill_rate)
    }
}

/// Per-client rate limiter over a single mutex-guarded bucket map.
///
/// Buckets are created lazily on first contact and removed by [`cleanup`]
/// once they have sat near-full past the idle threshold.
///
/// [`cleanup`]: RateLimiter::cleanup
pub struct RateLimiter {
    capacity: f64,
    window: Duration,
    clients: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `capacity` requests per `window`.
    pub fn new(capacity: u64, window: Duration) -> Self {
        Self {
            capacity: capacity as f64,
            window,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Base bucket capacity (requests per window).
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Refill window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Admits or denies one request for `client_id`.
    pub fn allow(&self, client_id: &str) -> bool {
        self.allow_n(client_id, 1.0)
    }

    /// Admits or denies a request costing `cost` tokens.
    ///
    /// The bucket is refilled first; on denial the token count is left
    /// unchanged. A zero cost never consumes anything.
    pub fn allow_n(&self, client_id: &str, cost: f64) -> bool {
        let now = Instant::now();
        let mut clients = self.clients.lock();
        let bucket = clients
            .entry(client_id.to_owned())
            .or_insert_with(|| TokenBucket::new(self.capacity, self.window));
        bucket.refill(now);
        bucket.last_touch = now;
        bucket.try_consume(cost)
    }

    /// Tokens currently available to `client_id` (full capacity for clients
    /// without a bucket yet).
    pub fn remaining_tokens(&self, client_id: &str) -> f64 {
        let mut clients = self.clients.lock();
        match clients.get_mut(client_id) {
            Some(bucket) => {
                bucket.refill(Instant::now());
                bucket.tokens
            }
            None => self.capacity,
        }
    }

    /// Retry-after hint: time until `client_id` has a whole token.
    pub fn time_until_next_token(&self, client_id: &str) -> Duration {
        let mut clients = self.clients.lock();
        match clients.get_mut(client_id) {
            Some(bucket) => {
                bucket.refill(Instant::now());
                bucket.time_until_next_token()
            }
            None => Duration::ZERO,
        }
    }

    /// Forces a client's bucket back to full capacity. Returns whether the
    /// client was tracked.
    pub fn reset(&self, client_id: &str) -> bool {
        let mut clients = self.clients.lock();
        match clients.get_mut(client_id) {
            Some(bucket) => {
                bucket.tokens = bucket.capacity;
                bucket.last_refill = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Resizes a client's bucket (adaptive limiter hook), creating it at the
    /// base capacity first if needed.
    pub(crate) fn resize_client(&self, client_id: &str, new_capacity: f64) {
        let mut clients = self.clients.lock();
        let bucket = clients
            .entry(client_id.to_owned())
            .or_insert_with(|| TokenBucket::new(self.capacity, self.window));
        bucket.refill(Instant::now());
        bucket.resize(new_capacity);
    }

    /// Per-client utilization snapshot, sorted by client id.
    pub fn stats(&self) -> Vec<ClientRateStats> {
        let now = Instant::now();
        let mut clients = self.clients.lock();
        let mut stats: Vec<ClientRateStats> = clients
            .iter_mut()
            .map(|(id, bucket)| {
                bucket.refill(now);
                ClientRateStats {
                    client_id: id.clone(),
                    capacity: bucket.capacity,
                    remaining_tokens: bucket.tokens,
                    utilization: bucket.utilization(),
                    multiplier: 1.0,
                    retry_after_secs: bucket.time_until_next_token().as_secs_f64(),
                }
            })
            .collect();
        stats.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        stats
    }

    /// Number of tracked client identities.
    pub fn tracked_clients(&self) -> usize {
        self.clients.lock().len()
    }

    /// Sweep cadence: `max(60s, window)`.
    pub fn sweep_interval(&self) -> Duration {
        self.window.max(MIN_SWEEP_INTERVAL)
    }

    /// Drops buckets that are ≥90% full and untouched for two sweep
    /// intervals. Bounds the client map without punishing active clients.
    pub fn cleanup(&self) -> usize {
        self.cleanup_idle(2 * self.sweep_interval())
    }

    /// Sweep body with an explicit idle threshold.
    pub fn cleanup_idle(&self, idle_threshold: Duration) -> usize {
        let now = Instant::now();
        let mut clients = self.clients.lock();
        let before = clients.len();
        clients.retain(|_, bucket| {
            bucket.refill(now);
            bucket.utilization() > 1.0 - SWEEP_FULLNESS
                || now.duration_since(bucket.last_touch) <= idle_threshold
        });
        before - clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_capacity_then_denies() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        for _ in 0..5 {
            assert!(limiter.allow("c1"));
        }
        assert!(!limiter.allow("c1"));
        // Other clients are unaffected.
        assert!(limiter.allow("c2"));
    }

    #[test]
    fn zero_cost_is_idempotent() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let before = limiter.remaining_tokens("c1");
        assert!(limiter.allow_n("c1", 0.0));
        assert!(limiter.allow_n("c1", 0.0));
        let after = limiter.remaining_tokens("c1");
        assert!((before - after).abs() < 1e-6);
    }

    #[test]
    fn successful_allow_consumes_exactly_cost() {
        let limiter = RateLimiter::new(10, Duration::from_secs(3600));
        assert!(limiter.allow_n("c1", 4.0));
        let remaining = limiter.remaining_tokens("c1");
        assert!((remaining - 6.0).abs() < 0.01, "remaining {remaining}");
    }

    #[test]
    fn denial_leaves_tokens_unchanged() {
        let limiter = RateLimiter::new(2, Duration::from_secs(3600));
        assert!(limiter.allow("c1"));
        assert!(limiter.allow("c1"));
        let before = limiter.remaining_tokens("c1");
        assert!(!limiter.allow("c1"));
        let after = limiter.remaining_tokens("c1");
        assert!((before - after).abs() < 0.01);
    }

    #[test]
    fn refills_one_token_after_one_interval() {
        // 5 tokens / 500ms window: one token per 100ms.
        let limiter = RateLimiter::new(5, Duration::from_millis(500));
        for _ in 0..5 {
            assert!(limiter.allow("c1"));
        }
        assert!(!limiter.allow("c1"));

        std::thread::sleep(Duration::from_millis(120));
        assert!(limiter.allow("c1"));
        assert!(!limiter.allow("c1"));
    }

    #[test]
    fn tokens_never_exceed_capacity() {
        let limiter = RateLimiter::new(3, Duration::from_millis(10));
        assert!(limiter.allow("c1"));
        std::thread::sleep(Duration::from_millis(50));
        let remaining = limiter.remaining_tokens("c1");
        assert!(remaining <= 3.0 + 1e-9, "remaining {remaining}");
    }

    #[test]
    fn retry_after_hint_reflects_refill_rate() {
        let limiter = RateLimiter::new(1, Duration::from_secs(10));
        assert!(limiter.allow("c1"));
        let hint = limiter.time_until_next_token("c1");
        assert!(hint > Duration::from_secs(8) && hint <= Duration::from_secs(10));
        assert_eq!(limiter.time_until_next_token("unseen"), Duration::ZERO);
    }

    #[test]
    fn reset_restores_full_capacity() {
        let limiter = RateLimiter::new(2, Duration::from_secs(3600));
        assert!(limiter.allow("c1"));
        assert!(limiter.allow("c1"));
        assert!(!limiter.allow("c1"));

        assert!(limiter.reset("c1"));
        assert!(limiter.allow("c1"));
        assert!(!limiter.reset("never-seen"));
    }

    #[test]
    fn cleanup_drops_only_idle_full_buckets() {
        let limiter = RateLimiter::new(10, Duration::from_millis(20));
        assert!(limiter.allow("idle"));
        limiter.allow_n("busy", 8.0);

        // After the tiny window, "idle" has refilled to full while "busy"
        // stays mostly consumed until its refill catches up.
        std::thread::sleep(Duration::from_millis(30));
        limiter.allow_n("busy", 8.0);

        let removed = limiter.cleanup_idle(Duration::ZERO);
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_clients(), 1);
        assert!(limiter.stats()[0].client_id == "busy");
    }

    #[test]
    fn sweep_interval_has_a_floor() {
        let limiter = RateLimiter::new(5, Duration::from_secs(5));
        assert_eq!(limiter.sweep_interval(), Duration::from_secs(60));
        let limiter = RateLimiter::new(5, Duration::from_secs(120));
        assert_eq!(limiter.sweep_interval(), Duration::from_secs(120));
    }

    #[test]
    fn stats_reports_utilization() {
        let limiter = RateLimiter::new(4, Duration::from_secs(3600));
        limiter.allow("c1");
        limiter.allow("c1");
        let stats = limiter.stats();
        assert_eq!(stats.len(), 1);
        assert!((stats[0].utilization - 0.5).abs() < 0.01);
        assert!((stats[0].remaining_tokens - 2.0).abs() < 0.01);
    }
}
