//! Concurrent set of live sessions.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::hub::payload::SessionId;
use crate::hub::session::ClientSession;

/// All currently registered sessions, keyed by id.
///
/// Every operation takes the lock briefly and never across an await or any
/// I/O. Broadcasts iterate a [`snapshot`](Registry::snapshot) instead of
/// holding the lock while delivering.
///
/// The registry also owns the inbound sequence. Each queued payload takes
/// the next number and each session is stamped with the current value when
/// it is inserted, so a session only receives payloads queued after it
/// joined.
#[derive(Default)]
pub struct Registry {
    sessions: Mutex<HashMap<SessionId, Arc<ClientSession>>>,
    sequence: AtomicU64,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session. Returns `false` if the id was already present.
    pub fn add(&self, session: Arc<ClientSession>) -> bool {
        let mut sessions = self.sessions.lock();
        session.mark_joined(self.current_sequence());
        sessions.insert(session.id().clone(), session).is_none()
    }

    /// Insert a session unless `limit` sessions are already registered
    /// (`0` = unlimited). Check and insert happen under one lock.
    pub fn try_add(&self, session: Arc<ClientSession>, limit: usize) -> bool {
        let mut sessions = self.sessions.lock();
        if limit > 0 && sessions.len() >= limit {
            return false;
        }
        session.mark_joined(self.current_sequence());
        let _ = sessions.insert(session.id().clone(), session);
        true
    }

    /// Claim the sequence number for a payload about to be queued.
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    /// Sequence number the next queued payload will get.
    pub fn current_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Remove a session. Removing an absent id is a no-op.
    pub fn remove(&self, id: &SessionId) -> Option<Arc<ClientSession>> {
        self.sessions.lock().remove(id)
    }

    /// Point-in-time copy of the registered sessions.
    pub fn snapshot(&self) -> Vec<Arc<ClientSession>> {
        self.sessions.lock().values().cloned().collect()
    }

    /// Look up one session.
    pub fn get(&self, id: &SessionId) -> Option<Arc<ClientSession>> {
        self.sessions.lock().get(id).cloned()
    }

    /// Whether the id is registered.
    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.lock().contains_key(id)
    }

    /// Registered ids.
    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.lock().keys().cloned().collect()
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Whether no session is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}
