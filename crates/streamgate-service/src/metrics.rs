//! Lightweight Prometheus-compatible metrics using atomic counters.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic service counters. Live gauges (session counts, queue depths)
/// are read from the owning components at render time.
#[derive(Default)]
pub struct Metrics {
    sessions_created_total: AtomicU64,
    sessions_evicted_total: AtomicU64,
    sessions_expired_total: AtomicU64,
    messages_enqueued_total: AtomicU64,
    events_sent_total: AtomicU64,
    heartbeats_sent_total: AtomicU64,
    broadcasts_total: AtomicU64,
    rate_limited_total: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_session_created(&self) {
        self.sessions_created_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_evicted(&self) {
        self.sessions_evicted_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sessions_expired(&self, count: u64) {
        self.sessions_expired_total
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_message_enqueued(&self) {
        self.messages_enqueued_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_sent(&self) {
        self.events_sent_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_heartbeat_sent(&self) {
        self.heartbeats_sent_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_broadcast(&self) {
        self.broadcasts_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sessions_created(&self) -> u64 {
        self.sessions_created_total.load(Ordering::Relaxed)
    }

    pub fn rate_limited(&self) -> u64 {
        self.rate_limited_total.load(Ordering::Relaxed)
    }

    /// Renders the Prometheus text exposition format.
    ///
    /// Gauges are passed in by the caller, which reads them from the live
    /// registry and limiter.
    pub fn render(
        &self,
        active_sessions: usize,
        queued_messages: usize,
        tracked_clients: usize,
        uptime_seconds: u64,
    ) -> String {
        let mut out = String::with_capacity(2048);

        gauge(
            &mut out,
            "streamgate_active_sessions",
            "Current number of live sessions",
            active_sessions,
        );
        gauge(
            &mut out,
            "streamgate_queued_messages",
            "Messages waiting in session queues",
            queued_messages,
        );
        gauge(
            &mut out,
            "streamgate_tracked_clients",
            "Client identities with a live rate-limit bucket",
            tracked_clients,
        );
        gauge(
            &mut out,
            "streamgate_uptime_seconds",
            "Server uptime in seconds",
            uptime_seconds,
        );

        counter(
            &mut out,
            "streamgate_sessions_created_total",
            "Sessions created since start",
            &self.sessions_created_total,
        );
        counter(
            &mut out,
            "streamgate_sessions_evicted_total",
            "Sessions evicted by the capacity policy",
            &self.sessions_evicted_total,
        );
        counter(
            &mut out,
            "streamgate_sessions_expired_total",
            "Sessions removed by the idle sweep",
            &self.sessions_expired_total,
        );
        counter(
            &mut out,
            "streamgate_messages_enqueued_total",
            "Control messages admitted and enqueued",
            &self.messages_enqueued_total,
        );
        counter(
            &mut out,
            "streamgate_events_sent_total",
            "Data-bearing events written to transports",
            &self.events_sent_total,
        );
        counter(
            &mut out,
            "streamgate_heartbeats_sent_total",
            "Heartbeat frames written to transports",
            &self.heartbeats_sent_total,
        );
        counter(
            &mut out,
            "streamgate_broadcasts_total",
            "Broadcast operations performed",
            &self.broadcasts_total,
        );
        counter(
            &mut out,
            "streamgate_rate_limited_total",
            "Requests denied by the rate limiter",
            &self.rate_limited_total,
        );

        out
    }
}

fn gauge(out: &mut String, name: &str, help: &str, value: impl std::fmt::Display) {
    writeln!(out, "# HELP {name} {help}").unwrap();
    writeln!(out, "# TYPE {name} gauge").unwrap();
    writeln!(out, "{name} {value}").unwrap();
}

fn counter(out: &mut String, name: &str, help: &str, value: &AtomicU64) {
    writeln!(out, "# HELP {name} {help}").unwrap();
    writeln!(out, "# TYPE {name} counter").unwrap();
    writeln!(out, "{name} {}", value.load(Ordering::Relaxed)).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_contains_gauges_and_counters() {
        let metrics = Metrics::new();
        metrics.record_session_created();
        metrics.record_rate_limited();
        metrics.record_rate_limited();

        let text = metrics.render(3, 7, 2, 42);
        assert!(text.contains("streamgate_active_sessions 3"));
        assert!(text.contains("streamgate_queued_messages 7"));
        assert!(text.contains("streamgate_tracked_clients 2"));
        assert!(text.contains("streamgate_uptime_seconds 42"));
        assert!(text.contains("streamgate_sessions_created_total 1"));
        assert!(text.contains("streamgate_rate_limited_total 2"));
    }
}
