//! Actions for the queue session reducer.

use crate::types::{AdmissionToken, ClientId, EventId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Commands and events processed by the session reducer.
///
/// Commands (`Enter`, `Tick`, `ResetPreview`) arrive from the HTTP layer
/// and the server ticker; the remaining variants are produced by effects
/// feeding back into the reducer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum QueueAction {
    /// A client joins (or rejoins) the queue for an event.
    ///
    /// The initial position is allocated by the engine before dispatch; it
    /// is ignored when a session already exists for the pair.
    Enter {
        /// Event being queued for
        event_id: EventId,
        /// Client joining
        client_id: ClientId,
        /// Allocated starting position
        initial_position: u32,
    },

    /// Server-side evaluation of one session against the wall clock.
    Tick {
        /// Event being queued for
        event_id: EventId,
        /// Client to evaluate
        client_id: ClientId,
    },

    /// The admission coordinator granted a capacity slot.
    ReleaseStarted {
        /// Event being queued for
        event_id: EventId,
        /// Client granted the slot
        client_id: ClientId,
        /// When the grant happened; anchors the grace window
        at: DateTime<Utc>,
    },

    /// The admission coordinator denied a slot (event at capacity or an
    /// earlier arrival is still waiting). The session stays `Waiting` and
    /// retries on a later tick.
    ReleaseDeferred {
        /// Event being queued for
        event_id: EventId,
        /// Client that was deferred
        client_id: ClientId,
    },

    /// The release grace window elapsed; finalize the release.
    CompleteRelease {
        /// Event being queued for
        event_id: EventId,
        /// Client to release
        client_id: ClientId,
    },

    /// An admission token was minted for a released session.
    AdmissionGranted {
        /// Event being queued for
        event_id: EventId,
        /// Released client
        client_id: ClientId,
        /// The minted token
        token: AdmissionToken,
        /// Token expiry
        expires_at: DateTime<Utc>,
    },

    /// Forced-preview re-entry: discard the session so the client runs the
    /// full queue cycle again.
    ResetPreview {
        /// Event being queued for
        event_id: EventId,
        /// Client to reset
        client_id: ClientId,
    },
}
