//! State for the queue session reducer.

use crate::types::{ClientId, EventId, QueuePhase, QueueSession};
use std::collections::HashMap;

/// All live queue sessions, keyed by `(event, client)`.
///
/// Sessions persist after release; the terminal `Released` record is the
/// in-memory idempotency guard for re-entry.
#[derive(Clone, Debug, Default)]
pub struct SessionsState {
    sessions: HashMap<(EventId, ClientId), QueueSession>,
}

impl SessionsState {
    /// Create an empty session map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a session.
    #[must_use]
    pub fn get(&self, event_id: EventId, client_id: ClientId) -> Option<&QueueSession> {
        self.sessions.get(&(event_id, client_id))
    }

    /// Look up a session mutably.
    pub fn get_mut(&mut self, event_id: EventId, client_id: ClientId) -> Option<&mut QueueSession> {
        self.sessions.get_mut(&(event_id, client_id))
    }

    /// Insert a session, replacing any existing one for the pair.
    pub fn insert(&mut self, session: QueueSession) {
        self.sessions
            .insert((session.event_id, session.client_id), session);
    }

    /// Remove a session, returning it if present.
    pub fn remove(&mut self, event_id: EventId, client_id: ClientId) -> Option<QueueSession> {
        self.sessions.remove(&(event_id, client_id))
    }

    /// Keys of all sessions that have not reached `Released`. These are the
    /// sessions the server-side ticker still needs to advance.
    #[must_use]
    pub fn active_keys(&self) -> Vec<(EventId, ClientId)> {
        self.sessions
            .iter()
            .filter(|(_, session)| session.phase != QueuePhase::Released)
            .map(|(key, _)| *key)
            .collect()
    }

    /// Number of tracked sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
