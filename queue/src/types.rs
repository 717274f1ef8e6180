//! Domain types for the hype-queue admission engine.
//!
//! Value objects and entities shared across the engine: identifiers, the
//! per-event queue configuration supplied by admin tooling, the queue
//! session owned by the release state machine, and the admission token
//! handed to the purchase flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a ticketed event
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a queueing client (one per browser/device)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClientId(Uuid);

impl ClientId {
    /// Creates a new random `ClientId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `ClientId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Single-use, short-TTL proof that a client completed the queue for a
/// specific event. Opaque to everyone but the token store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdmissionToken(Uuid);

impl AdmissionToken {
    /// Mint a new random token value
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `AdmissionToken` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AdmissionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AdmissionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Queue configuration (admin-owned, read-only to the engine)
// ============================================================================

/// When the queue gates arrivals for an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueWindow {
    /// Queueing never engages for this event.
    Disabled,
    /// Explicit admin-configured on-sale window.
    Explicit {
        /// Window start (inclusive)
        start: DateTime<Utc>,
        /// Window end (exclusive)
        end: DateTime<Utc>,
    },
    /// Queueing engages the moment the announcement countdown completes.
    AutoAfterAnnouncement {
        /// When the announcement countdown ends
        announcement_ends_at: DateTime<Utc>,
    },
}

/// Display copy shown to waiting clients.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCopy {
    /// Headline shown on the waiting page
    pub title: String,
    /// Supporting line shown under the headline
    pub subtitle: String,
}

/// Per-event queue configuration, owned by admin tooling and read-only to
/// the queue engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventQueueConfig {
    /// Master switch for queueing on this event
    pub enabled: bool,
    /// When the queue gates arrivals
    pub window: QueueWindow,
    /// Seconds a freshly-allocated position takes to drain to zero
    pub duration_secs: u32,
    /// Venue/event capacity; bounds concurrent admission and scales
    /// position allocation
    pub capacity: u32,
    /// Admin testing mode: always run the full queue cycle, resetting any
    /// prior released record
    pub forced_preview: bool,
    /// Positions at or below this value light up the near-front UI hint
    pub near_front_threshold: u32,
    /// Waiting-page copy
    pub copy: QueueCopy,
}

// ============================================================================
// Queue session
// ============================================================================

/// Lifecycle phase of a queue session.
///
/// Transitions are strictly `Waiting → Releasing → Released` and never
/// reverse. The ordering derives (`Ord`) so observers can refuse to regress
/// a phase while disconnected.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum QueuePhase {
    /// Position draining toward zero
    #[default]
    Waiting,
    /// Position hit zero and a capacity slot was granted; grace window
    /// running before the final hand-off
    Releasing,
    /// Terminal: released to the purchase flow
    Released,
}

impl fmt::Display for QueuePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Releasing => write!(f, "releasing"),
            Self::Released => write!(f, "released"),
        }
    }
}

/// One queue session per (event, client). Owned exclusively by the queue
/// engine; never deleted, it remains as the idempotency record after
/// release.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSession {
    /// Event being queued for
    pub event_id: EventId,
    /// Client holding the session
    pub client_id: ClientId,
    /// Wall-clock entry time; the drain anchor
    pub entered_at: DateTime<Utc>,
    /// Starting position assigned by the allocator
    pub initial_position: u32,
    /// Current lifecycle phase
    pub phase: QueuePhase,
    /// When the grace window started, once `Releasing`
    pub releasing_since: Option<DateTime<Utc>>,
    /// When the session was released, once `Released`
    pub released_at: Option<DateTime<Utc>>,
    /// Admission token, once minted for this session
    pub token: Option<AdmissionToken>,
    /// Token expiry, set alongside `token`
    pub token_expires_at: Option<DateTime<Utc>>,
    /// A coordinator slot request is in flight; suppresses duplicate
    /// acquisition attempts between ticks
    #[serde(skip)]
    pub acquire_pending: bool,
}

impl QueueSession {
    /// Create a fresh waiting session.
    #[must_use]
    pub const fn new(
        event_id: EventId,
        client_id: ClientId,
        entered_at: DateTime<Utc>,
        initial_position: u32,
    ) -> Self {
        Self {
            event_id,
            client_id,
            entered_at,
            initial_position,
            phase: QueuePhase::Waiting,
            releasing_since: None,
            released_at: None,
            token: None,
            token_expires_at: None,
            acquire_pending: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_ordering_matches_lifecycle() {
        assert!(QueuePhase::Waiting < QueuePhase::Releasing);
        assert!(QueuePhase::Releasing < QueuePhase::Released);
    }

    #[test]
    fn ids_round_trip_through_uuid() {
        let uuid = Uuid::new_v4();
        let id = EventId::from_uuid(uuid);
        assert_eq!(*id.as_uuid(), uuid);
        assert_eq!(id.to_string(), uuid.to_string());
    }

    #[test]
    fn new_session_starts_waiting() {
        let session = QueueSession::new(EventId::new(), ClientId::new(), Utc::now(), 1200);
        assert_eq!(session.phase, QueuePhase::Waiting);
        assert!(session.releasing_since.is_none());
        assert!(session.released_at.is_none());
        assert!(session.token.is_none());
    }
}
