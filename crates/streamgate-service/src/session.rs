//! Session registry: binds logical user identities to outbound queues.
//!
//! A single registry owns the primary `session_id → session` table and the
//! secondary `user_id → set<session_id>` index. Both live under one mutex so
//! every operation observes them in lockstep; each critical section is O(1)
//! map work (eviction scans are bounded by `max_sessions`).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::metrics::Metrics;
use crate::queue::MessageQueue;
use crate::types::{RegistryStats, SessionDetail, SessionInfo};

/// One client's logical identity and outbound channel.
pub struct Session {
    session_id: String,
    user_id: String,
    created_at: Instant,
    last_active: Instant,
    request_count: u64,
    initialized: bool,
    metadata: HashMap<String, serde_json::Value>,
    queue: Arc<MessageQueue>,
}

impl Session {
    fn new(session_id: String, user_id: String) -> Self {
        let now = Instant::now();
        Self {
            session_id,
            user_id,
            created_at: now,
            last_active: now,
            request_count: 0,
            initialized: false,
            metadata: HashMap::new(),
            queue: Arc::new(MessageQueue::new()),
        }
    }

    /// Marks activity: bumps `last_active` (monotone) and counts the request.
    fn touch(&mut self) {
        self.last_active = Instant::now().max(self.last_active);
        self.request_count += 1;
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    pub fn initialized(&self) -> bool {
        self.initialized
    }

    /// Time since the last activity touch.
    pub fn idle(&self) -> Duration {
        self.last_active.elapsed()
    }

    /// Time since creation.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// The session's outbound queue handle.
    pub fn queue(&self) -> &Arc<MessageQueue> {
        &self.queue
    }

    fn snapshot(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            age_secs: self.age().as_secs(),
            idle_secs: self.idle().as_secs(),
            request_count: self.request_count,
            queue_depth: self.queue.len(),
            initialized: self.initialized,
        }
    }
}

struct Tables {
    sessions: HashMap<String, Arc<Mutex<Session>>>,
    by_user: HashMap<String, HashSet<String>>,
}

impl Tables {
    /// Removes a session from both tables and closes its queue.
    fn remove(&mut self, session_id: &str) -> Option<Arc<Mutex<Session>>> {
        let entry = self.sessions.remove(session_id)?;
        {
            let session = entry.lock();
            session.queue.close();
            let dropped = session.queue.clear();
            if dropped > 0 {
                tracing::debug!(
                    session_id,
                    dropped,
                    "discarded queued messages on session removal"
                );
            }
            if let Some(ids) = self.by_user.get_mut(&session.user_id) {
                ids.remove(session_id);
                if ids.is_empty() {
                    self.by_user.remove(&session.user_id);
                }
            }
        }
        Some(entry)
    }

    /// Id of the session with the smallest `created_at`.
    fn oldest(&self) -> Option<String> {
        self.sessions
            .iter()
            .min_by_key(|(_, s)| s.lock().created_at)
            .map(|(id, _)| id.clone())
    }
}

/// Thread-safe registry of live sessions with capacity and TTL enforcement.
pub struct SessionRegistry {
    max_sessions: usize,
    metrics: Arc<Metrics>,
    tables: Mutex<Tables>,
}

impl SessionRegistry {
    /// Creates an empty registry holding at most `max_sessions` entries.
    pub fn new(max_sessions: usize, metrics: Arc<Metrics>) -> Self {
        Self {
            max_sessions: max_sessions.max(1),
            metrics,
            tables: Mutex::new(Tables {
                sessions: HashMap::new(),
                by_user: HashMap::new(),
            }),
        }
    }

    /// Resolves or creates a session, returning its id.
    ///
    /// Re-registering an existing `session_id` is an idempotent re-touch.
    /// When the registry is full, the single oldest-by-`created_at` session
    /// is evicted before the new one is inserted.
    pub fn create(&self, user_id: &str, session_id: Option<&str>) -> String {
        let mut tables = self.tables.lock();

        if let Some(id) = session_id
            && let Some(existing) = tables.sessions.get(id)
        {
            existing.lock().touch();
            return id.to_owned();
        }

        if tables.sessions.len() >= self.max_sessions
            && let Some(oldest) = tables.oldest()
        {
            tables.remove(&oldest);
            self.metrics.record_session_evicted();
            tracing::info!(session_id = %oldest, "evicted oldest session at capacity");
        }

        let id = session_id.map_or_else(|| Uuid::new_v4().to_string(), str::to_owned);
        let session = Arc::new(Mutex::new(Session::new(id.clone(), user_id.to_owned())));
        tables.sessions.insert(id.clone(), session);
        tables
            .by_user
            .entry(user_id.to_owned())
            .or_default()
            .insert(id.clone());
        self.metrics.record_session_created();
        tracing::debug!(session_id = %id, user_id, "session created");
        id
    }

    /// Returns the session if present, touching it (a read implies
    /// liveness, so it counts like any other activity).
    pub fn get(&self, session_id: &str) -> Option<Arc<Mutex<Session>>> {
        let entry = {
            let tables = self.tables.lock();
            Arc::clone(tables.sessions.get(session_id)?)
        };
        entry.lock().touch();
        Some(entry)
    }

    /// Returns the session's queue handle without touching liveness.
    pub fn queue(&self, session_id: &str) -> Option<Arc<MessageQueue>> {
        let tables = self.tables.lock();
        tables
            .sessions
            .get(session_id)
            .map(|s| Arc::clone(&s.lock().queue))
    }

    /// Removes a session from both tables, closing and draining its queue.
    pub fn remove(&self, session_id: &str) -> bool {
        let removed = self.tables.lock().remove(session_id).is_some();
        if removed {
            tracing::debug!(session_id, "session removed");
        }
        removed
    }

    /// Marks the handshake as completed for a session. Not an activity
    /// touch; the submission that carried the handshake already counted.
    pub fn mark_initialized(&self, session_id: &str) -> bool {
        let Some(entry) = ({
            let tables = self.tables.lock();
            tables.sessions.get(session_id).map(Arc::clone)
        }) else {
            return false;
        };
        entry.lock().initialized = true;
        true
    }

    /// Sets a free-form metadata entry on a session.
    pub fn set_metadata(&self, session_id: &str, key: &str, value: serde_json::Value) -> bool {
        let Some(entry) = ({
            let tables = self.tables.lock();
            tables.sessions.get(session_id).map(Arc::clone)
        }) else {
            return false;
        };
        entry.lock().metadata.insert(key.to_owned(), value);
        true
    }

    /// Reads a metadata entry from a session.
    pub fn get_metadata(&self, session_id: &str, key: &str) -> Option<serde_json::Value> {
        let entry = {
            let tables = self.tables.lock();
            Arc::clone(tables.sessions.get(session_id)?)
        };
        let session = entry.lock();
        session.metadata.get(key).cloned()
    }

    /// Enqueues a message onto one session. Returns `false` if the session
    /// does not exist or its queue is already closed.
    pub fn send_to(&self, session_id: &str, message: serde_json::Value) -> bool {
        let Some(entry) = ({
            let tables = self.tables.lock();
            tables.sessions.get(session_id).map(Arc::clone)
        }) else {
            tracing::debug!(session_id, "enqueue on missing session dropped");
            return false;
        };
        let queue = {
            let mut session = entry.lock();
            session.touch();
            Arc::clone(&session.queue)
        };
        match queue.push(message) {
            Ok(()) => true,
            Err(_) => {
                tracing::debug!(session_id, "enqueue raced with session removal");
                false
            }
        }
    }

    /// Enqueues a message onto every live session except `exclude`.
    ///
    /// Per-session failures (a queue closed by a concurrent removal) are
    /// logged and do not abort delivery to the rest. Returns the number of
    /// sessions the message reached.
    pub fn broadcast(&self, message: &serde_json::Value, exclude: Option<&str>) -> usize {
        let targets: Vec<(String, Arc<MessageQueue>)> = {
            let tables = self.tables.lock();
            tables
                .sessions
                .iter()
                .filter(|(id, _)| exclude != Some(id.as_str()))
                .map(|(id, s)| (id.clone(), Arc::clone(&s.lock().queue)))
                .collect()
        };

        let mut delivered = 0;
        for (id, queue) in targets {
            match queue.push(message.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::debug!(session_id = %id, "broadcast skipped removed session");
                }
            }
        }
        self.metrics.record_broadcast();
        delivered
    }

    /// Removes every session idle longer than `timeout`. Returns the count.
    pub fn cleanup_expired(&self, timeout: Duration) -> usize {
        let mut tables = self.tables.lock();
        let expired: Vec<String> = tables
            .sessions
            .iter()
            .filter(|(_, s)| s.lock().idle() > timeout)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            tables.remove(id);
        }
        if !expired.is_empty() {
            self.metrics.record_sessions_expired(expired.len() as u64);
        }
        expired.len()
    }

    /// Closes every session's queue so no dispatcher blocks past shutdown.
    pub fn close_all(&self) {
        let tables = self.tables.lock();
        for session in tables.sessions.values() {
            session.lock().queue.close();
        }
    }

    /// Number of live sessions.
    pub fn count(&self) -> usize {
        self.tables.lock().sessions.len()
    }

    /// Snapshot of every live session (does not touch liveness).
    pub fn list(&self) -> Vec<SessionInfo> {
        let tables = self.tables.lock();
        let mut infos: Vec<SessionInfo> = tables
            .sessions
            .values()
            .map(|s| s.lock().snapshot())
            .collect();
        infos.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        infos
    }

    /// Full view of one session (does not touch liveness).
    pub fn detail(&self, session_id: &str) -> Option<SessionDetail> {
        let entry = {
            let tables = self.tables.lock();
            Arc::clone(tables.sessions.get(session_id)?)
        };
        let session = entry.lock();
        Some(SessionDetail {
            info: session.snapshot(),
            metadata: session.metadata.clone(),
        })
    }

    /// Aggregate statistics over all live sessions.
    pub fn stats(&self) -> RegistryStats {
        let tables = self.tables.lock();
        let session_count = tables.sessions.len();
        let sessions_per_user = tables
            .by_user
            .iter()
            .map(|(user, ids)| (user.clone(), ids.len()))
            .collect();
        let mut age_sum = 0.0;
        let mut queued_messages = 0;
        for entry in tables.sessions.values() {
            let session = entry.lock();
            age_sum += session.age().as_secs_f64();
            queued_messages += session.queue.len();
        }
        let avg_age_secs = if session_count == 0 {
            0.0
        } else {
            age_sum / session_count as f64
        };
        RegistryStats {
            session_count,
            sessions_per_user,
            avg_age_secs,
            queued_messages,
        }
    }

    /// Total queued messages across all sessions.
    pub fn queued_messages(&self) -> usize {
        let tables = self.tables.lock();
        tables
            .sessions
            .values()
            .map(|s| s.lock().queue.len())
            .sum()
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        let tables = self.tables.lock();
        for (id, session) in &tables.sessions {
            let user_id = session.lock().user_id.clone();
            let indexed = tables
                .by_user
                .iter()
                .filter(|(_, ids)| ids.contains(id))
                .count();
            assert_eq!(indexed, 1, "session {id} indexed {indexed} times");
            assert!(tables.by_user[&user_id].contains(id));
        }
        for (user, ids) in &tables.by_user {
            assert!(!ids.is_empty(), "user {user} has an empty index entry");
            for id in ids {
                assert!(tables.sessions.contains_key(id));
            }
        }
    }
}
