//! Per-session outbound message queue.
//!
//! FIFO queue of opaque JSON payloads with many producers and a single
//! async consumer (the session's connection dispatcher). The lock is never
//! held across an await; waiting consumers park on a [`tokio::sync::Notify`].

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Error returned when enqueueing onto a closed queue.
///
/// A close races benignly with in-flight enqueues: the session is gone, so
/// the message is dropped and the producer decides whether that matters.
#[derive(Debug, thiserror::Error)]
#[error("queue closed")]
pub struct QueueClosed;

/// Outcome of a timed dequeue attempt.
#[derive(Debug)]
pub enum Pop {
    /// The next message in FIFO order.
    Message(serde_json::Value),
    /// No message arrived before the deadline.
    Timeout,
    /// The queue was closed; no further messages will arrive.
    Closed,
}

struct Inner {
    items: VecDeque<serde_json::Value>,
    closed: bool,
}

/// Thread-safe FIFO queue backing one session's outbound channel.
pub struct MessageQueue {
    inner: Mutex<Inner>,
    notify: Notify,
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageQueue {
    /// Creates a new open, empty queue.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Appends a message, waking the consumer if it is waiting.
    pub fn push(&self, message: serde_json::Value) -> Result<(), QueueClosed> {
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(QueueClosed);
            }
            inner.items.push_back(message);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Dequeues the next message, waiting up to `timeout` for one to arrive.
    ///
    /// Single-consumer: only the session's dispatcher may call this.
    pub async fn pop_timeout(&self, timeout: Duration) -> Pop {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(pop) = self.try_pop() {
                return pop;
            }
            // Register before re-checking so a push between the check and the
            // await leaves a stored permit instead of a lost wakeup.
            let notified = self.notify.notified();
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.try_pop().unwrap_or(Pop::Timeout);
            }
        }
    }

    fn try_pop(&self) -> Option<Pop> {
        let mut inner = self.inner.lock();
        if let Some(message) = inner.items.pop_front() {
            return Some(Pop::Message(message));
        }
        if inner.closed {
            return Some(Pop::Closed);
        }
        None
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Whether the queue holds no messages.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Whether the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Closes the queue and wakes any waiting consumer. Idempotent.
    pub fn close(&self) {
        {
            let mut inner = self.inner.lock();
            inner.closed = true;
        }
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    /// Discards all queued messages, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let dropped = inner.items.len();
        inner.items.clear();
        dropped
    }
}
