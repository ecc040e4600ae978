//! Behavior-adaptive decorator over the token-bucket rate limiter.
//!
//! Tracks per-client success ratio and request pacing as exponentially
//! weighted moving averages, and scales the client's effective bucket
//! capacity within `[min_multiplier, max_multiplier] × base`. Steady,
//! reliable clients earn headroom; bursty or failing ones are tightened.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::rate_limit::RateLimiter;
use crate::types::ClientRateStats;

/// Weight given to the newest sample in the EWMAs.
const EWMA_WEIGHT: f64 = 0.1;

/// Cap on the pacing reward before the success ratio is applied.
const PACING_CAP: f64 = 2.0;

struct ClientProfile {
    /// EWMA of request outcomes, `1.0` = always succeeding.
    success_rate: f64,
    /// EWMA of seconds between requests.
    avg_interval: f64,
    last_request: Instant,
}

/// Rate limiter that resizes each client's bucket from observed behavior.
pub struct AdaptiveRateLimiter {
    base: RateLimiter,
    /// Nominal seconds between requests at exactly the base rate.
    base_interval: f64,
    min_multiplier: f64,
    max_multiplier: f64,
    profiles: DashMap<String, ClientProfile>,
}

impl AdaptiveRateLimiter {
    /// Wraps a base limiter with behavior tracking.
    ///
    /// `min_multiplier` and `max_multiplier` bound the effective capacity
    /// as fractions of the base capacity; they are reordered if passed
    /// inverted and floored at a small positive value.
    pub fn new(base: RateLimiter, min_multiplier: f64, max_multiplier: f64) -> Self {
        let lo = min_multiplier.min(max_multiplier).max(0.01);
        let hi = min_multiplier.max(max_multiplier).max(lo);
        let base_interval =
            base.window().as_secs_f64() / base.capacity().max(1.0);
        Self {
            base,
            base_interval,
            min_multiplier: lo,
            max_multiplier: hi,
            profiles: DashMap::new(),
        }
    }

    /// The wrapped limiter.
    pub fn base(&self) -> &RateLimiter {
        &self.base
    }

    /// Admits or denies one request, after resizing the client's bucket to
    /// its current effective capacity.
    pub fn allow(&self, client_id: &str) -> bool {
        let multiplier = self.observe_request(client_id);
        let effective = self.base.capacity() * multiplier;
        self.base.resize_client(client_id, effective);
        self.base.allow(client_id)
    }

    /// Records the outcome of an admitted request.
    pub fn record_result(&self, client_id: &str, success: bool) {
        let sample = if success { 1.0 } else { 0.0 };
        let mut profile = self
            .profiles
            .entry(client_id.to_owned())
            .or_insert_with(|| self.fresh_profile());
        profile.success_rate =
            profile.success_rate * (1.0 - EWMA_WEIGHT) + sample * EWMA_WEIGHT;
    }

    /// Current bounded multiplier for a client (`1.0` when unseen, modulo
    /// the configured bounds).
    pub fn multiplier(&self, client_id: &str) -> f64 {
        match self.profiles.get(client_id) {
            Some(profile) => self.compute_multiplier(&profile),
            None => 1.0f64.clamp(self.min_multiplier, self.max_multiplier),
        }
    }

    /// Effective bucket capacity currently applied to a client.
    pub fn effective_capacity(&self, client_id: &str) -> f64 {
        self.base.capacity() * self.multiplier(client_id)
    }

    /// Retry-after hint from the wrapped limiter.
    pub fn time_until_next_token(&self, client_id: &str) -> Duration {
        self.base.time_until_next_token(client_id)
    }

    /// Forces a client's bucket back to capacity.
    pub fn reset(&self, client_id: &str) -> bool {
        self.profiles.remove(client_id);
        self.base.reset(client_id)
    }

    /// Per-client snapshot with the adaptive multiplier filled in.
    pub fn stats(&self) -> Vec<ClientRateStats> {
        let mut stats = self.base.stats();
        for entry in &mut stats {
            entry.multiplier = self.multiplier(&entry.client_id);
        }
        stats
    }

    /// Number of tracked client identities.
    pub fn tracked_clients(&self) -> usize {
        self.base.tracked_clients()
    }

    /// Sweep cadence, forwarded from the wrapped limiter.
    pub fn sweep_interval(&self) -> Duration {
        self.base.sweep_interval()
    }

    /// Drops idle buckets and their stale behavior profiles.
    pub fn cleanup(&self) -> usize {
        let idle_threshold = 2 * self.base.sweep_interval();
        self.profiles
            .retain(|_, profile| profile.last_request.elapsed() <= idle_threshold);
        self.base.cleanup()
    }

    fn fresh_profile(&self) -> ClientProfile {
        ClientProfile {
            success_rate: 1.0,
            avg_interval: self.base_interval,
            last_request: Instant::now(),
        }
    }

    /// Folds the current request into the pacing EWMA and returns the
    /// multiplier to apply.
    fn observe_request(&self, client_id: &str) -> f64 {
        let now = Instant::now();
        let mut profile = self
            .profiles
            .entry(client_id.to_owned())
            .or_insert_with(|| self.fresh_profile());
        let gap = now.duration_since(profile.last_request).as_secs_f64();
        if gap > 0.0 {
            profile.avg_interval =
                profile.avg_interval * (1.0 - EWMA_WEIGHT) + gap * EWMA_WEIGHT;
        }
        profile.last_request = now;
        self.compute_multiplier(&profile)
    }

    fn compute_multiplier(&self, profile: &ClientProfile) -> f64 {
        let pacing = if self.base_interval > 0.0 {
            (profile.avg_interval / self.base_interval).min(PACING_CAP)
        } else {
            1.0
        };
        (profile.success_rate * pacing).clamp(self.min_multiplier, self.max_multiplier)
    }
}
