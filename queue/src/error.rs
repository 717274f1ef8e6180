//! Error types for the hype-queue admission engine.

use crate::types::{ClientId, EventId};

/// Convenience result alias for engine operations.
pub type Result<T, E = QueueError> = std::result::Result<T, E>;

/// Errors surfaced by the queue engine and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// No queue configuration registered for the event.
    #[error("no queue configuration for event {0}")]
    UnknownEvent(EventId),

    /// No session exists for this (event, client) pair.
    #[error("no queue session for client {client_id} on event {event_id}")]
    SessionNotFound {
        /// Event being queried
        event_id: EventId,
        /// Client being queried
        client_id: ClientId,
    },

    /// The admission token was never issued, or is scoped to a different
    /// event.
    #[error("admission token is not valid")]
    TokenInvalid,

    /// The admission token has already been consumed; tokens are
    /// single-use and are not re-issued.
    #[error("admission token already consumed")]
    TokenConsumed,

    /// The admission token expired before it was consumed.
    #[error("admission token expired")]
    TokenExpired,

    /// The durable client-state layer failed; the engine degrades to
    /// in-memory state rather than failing the admission path.
    #[error("client queue state store unavailable: {0}")]
    StateStoreUnavailable(String),

    /// The underlying action store rejected a dispatch.
    #[error(transparent)]
    Store(#[from] hype_queue_runtime::StoreError),
}
