//! Per-connection dispatch loop.
//!
//! A [`ConnectionDispatcher`] drains one session's outbound queue onto a
//! live transport, interleaving heartbeats so idle connections still emit
//! traffic. Transport adapters call [`next_event`] in a loop and write each
//! frame; `None` means the connection is done (queue closed, session
//! removed, or shutdown signalled).
//!
//! [`next_event`]: ConnectionDispatcher::next_event

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::events::OutboundEvent;
use crate::queue::{MessageQueue, Pop};

/// Dequeue poll timeout; bounds worst-case heartbeat latency.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Lifecycle of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Streaming,
    Closed,
}

/// Drains one session's queue and injects heartbeats.
pub struct ConnectionDispatcher {
    session_id: String,
    queue: Arc<MessageQueue>,
    heartbeat_interval: Duration,
    poll_timeout: Duration,
    last_sent: Instant,
    state: ConnectionState,
    shutdown: CancellationToken,
}

impl ConnectionDispatcher {
    /// Builds a dispatcher over a session's queue.
    ///
    /// `shutdown` is typically a child of the service-wide token so process
    /// shutdown unwinds every connection.
    pub fn new(
        session_id: String,
        queue: Arc<MessageQueue>,
        heartbeat_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            session_id,
            queue,
            heartbeat_interval,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            last_sent: Instant::now(),
            state: ConnectionState::Connecting,
            shutdown,
        }
    }

    /// Overrides the dequeue poll timeout (tests use short polls).
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Produces the next frame for this connection.
    ///
    /// Returns queued messages in FIFO order; after `heartbeat_interval`
    /// with nothing sent, returns a heartbeat instead. Returns `None` once
    /// the queue is closed or shutdown is signalled, after which the
    /// dispatcher stays closed.
    pub async fn next_event(&mut self) -> Option<OutboundEvent> {
        if self.state == ConnectionState::Closed {
            return None;
        }
        self.state = ConnectionState::Streaming;

        loop {
            let pop = tokio::select! {
                () = self.shutdown.cancelled() => {
                    tracing::debug!(session_id = %self.session_id, "dispatcher cancelled");
                    self.state = ConnectionState::Closed;
                    return None;
                }
                pop = self.queue.pop_timeout(self.poll_timeout) => pop,
            };

            match pop {
                Pop::Message(payload) => {
                    self.last_sent = Instant::now();
                    return Some(OutboundEvent::message(payload));
                }
                Pop::Closed => {
                    tracing::debug!(session_id = %self.session_id, "queue closed, ending stream");
                    self.state = ConnectionState::Closed;
                    return None;
                }
                Pop::Timeout => {
                    if self.last_sent.elapsed() >= self.heartbeat_interval {
                        self.last_sent = Instant::now();
                        return Some(OutboundEvent::heartbeat());
                    }
                }
            }
        }
    }
}
