//! Durable per-(event, client) queue state.
//!
//! The [`ClientQueueStateStore`] records whether a client has entered
//! and/or been released for a given event. It is consulted before any
//! session is allocated (to short-circuit already-released clients) and
//! written on entry and release so those facts survive reload.
//!
//! Scoping is strictly per event: releasing from event A never satisfies
//! admission for event B.
//!
//! The admission path must never crash because the persistence layer is
//! blocked, so [`FallbackStateStore`] wraps any primary store and degrades
//! to in-memory records for the rest of the process lifetime on the first
//! failure. In degraded mode reload-survival is no longer guaranteed; that
//! limitation is logged, not hidden.

use crate::error::Result;
use crate::types::{ClientId, EventId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Per-(event, client) durable record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClientQueueRecord {
    /// Client has entered this event's queue at least once.
    pub entered: bool,
    /// Client has been released from this event's queue.
    pub released: bool,
}

/// Durable per-(event, client) queue state.
///
/// Implementations must scope records per event and must be safe to read
/// before any session exists.
#[async_trait]
pub trait ClientQueueStateStore: Send + Sync {
    /// Whether the client has entered this event's queue.
    async fn has_entered(&self, event_id: EventId, client_id: ClientId) -> Result<bool>;

    /// Whether the client has been released from this event's queue.
    async fn has_released(&self, event_id: EventId, client_id: ClientId) -> Result<bool>;

    /// Record that the client entered this event's queue.
    async fn record_entered(&self, event_id: EventId, client_id: ClientId) -> Result<()>;

    /// Record that the client was released from this event's queue.
    /// Permanent; survives reload.
    async fn record_released(&self, event_id: EventId, client_id: ClientId) -> Result<()>;

    /// Clear the record for this (event, client). Preview/testing only.
    async fn reset(&self, event_id: EventId, client_id: ClientId) -> Result<()>;
}

/// In-memory implementation, also used as the degraded-mode fallback.
#[derive(Debug, Default)]
pub struct MemoryClientQueueStateStore {
    records: RwLock<HashMap<(EventId, ClientId), ClientQueueRecord>>,
}

impl MemoryClientQueueStateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientQueueStateStore for MemoryClientQueueStateStore {
    async fn has_entered(&self, event_id: EventId, client_id: ClientId) -> Result<bool> {
        let records = self.records.read().await;
        Ok(records
            .get(&(event_id, client_id))
            .is_some_and(|r| r.entered))
    }

    async fn has_released(&self, event_id: EventId, client_id: ClientId) -> Result<bool> {
        let records = self.records.read().await;
        Ok(records
            .get(&(event_id, client_id))
            .is_some_and(|r| r.released))
    }

    async fn record_entered(&self, event_id: EventId, client_id: ClientId) -> Result<()> {
        let mut records = self.records.write().await;
        records.entry((event_id, client_id)).or_default().entered = true;
        Ok(())
    }

    async fn record_released(&self, event_id: EventId, client_id: ClientId) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records.entry((event_id, client_id)).or_default();
        record.entered = true;
        record.released = true;
        Ok(())
    }

    async fn reset(&self, event_id: EventId, client_id: ClientId) -> Result<()> {
        let mut records = self.records.write().await;
        records.remove(&(event_id, client_id));
        Ok(())
    }
}

/// Wraps a primary store and degrades to in-memory state on failure.
///
/// The first primary error flips the store into degraded mode for the
/// rest of the process lifetime; all subsequent operations go to the
/// in-memory fallback. Reads and writes therefore keep succeeding, at the
/// disclosed cost of reload-survival.
pub struct FallbackStateStore<P> {
    primary: P,
    fallback: MemoryClientQueueStateStore,
    degraded: AtomicBool,
}

impl<P: ClientQueueStateStore> FallbackStateStore<P> {
    /// Wrap a primary store.
    #[must_use]
    pub fn new(primary: P) -> Self {
        Self {
            primary,
            fallback: MemoryClientQueueStateStore::new(),
            degraded: AtomicBool::new(false),
        }
    }

    /// Whether the store has degraded to in-memory mode.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    fn degrade(&self, err: &crate::error::QueueError) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                error = %err,
                "client queue state store unavailable; degrading to in-memory \
                 state (queue progress will not survive reload)"
            );
        }
    }
}

macro_rules! with_fallback {
    ($self:ident, $method:ident ( $($arg:expr),* )) => {{
        if $self.degraded.load(Ordering::SeqCst) {
            return $self.fallback.$method($($arg),*).await;
        }
        match $self.primary.$method($($arg),*).await {
            Ok(value) => Ok(value),
            Err(err) => {
                $self.degrade(&err);
                $self.fallback.$method($($arg),*).await
            }
        }
    }};
}

#[async_trait]
impl<P: ClientQueueStateStore> ClientQueueStateStore for FallbackStateStore<P> {
    async fn has_entered(&self, event_id: EventId, client_id: ClientId) -> Result<bool> {
        with_fallback!(self, has_entered(event_id, client_id))
    }

    async fn has_released(&self, event_id: EventId, client_id: ClientId) -> Result<bool> {
        with_fallback!(self, has_released(event_id, client_id))
    }

    async fn record_entered(&self, event_id: EventId, client_id: ClientId) -> Result<()> {
        with_fallback!(self, record_entered(event_id, client_id))
    }

    async fn record_released(&self, event_id: EventId, client_id: ClientId) -> Result<()> {
        with_fallback!(self, record_released(event_id, client_id))
    }

    async fn reset(&self, event_id: EventId, client_id: ClientId) -> Result<()> {
        with_fallback!(self, reset(event_id, client_id))
    }
}
