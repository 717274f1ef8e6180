//! Server-side admission coordination.
//!
//! A purely client-local countdown cannot bound how many clients sit in
//! `releasing`/`released` at once, which defeats an admission controller
//! protecting finite inventory. The [`AdmissionCoordinator`] is the
//! authority: it holds, per event, the set of currently admitted sessions
//! bounded by event capacity and grants slots atomically at release time.
//!
//! Slots are leases, not grants-forever: an admitted client heartbeats to
//! keep its lease alive, consuming the admission token marks the lease as
//! an active checkout (longer deadline), and [`reclaim_expired`] frees
//! slots whose clients disappeared so an abandoned checkout never blocks
//! the queue indefinitely.
//!
//! Fairness: sessions denied at capacity are remembered as waiters ordered
//! by entry time; a slot is only granted to the earliest waiter asking, so
//! releases stay consistent with arrival order modulo allocation jitter.
//! No state is shared between events.
//!
//! [`reclaim_expired`]: AdmissionCoordinator::reclaim_expired

use crate::error::Result;
use crate::types::{ClientId, EventId};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

/// Authority over concurrent admission, scoped per event.
#[async_trait]
pub trait AdmissionCoordinator: Send + Sync {
    /// Atomically try to claim an admission slot for a session whose
    /// position reached zero. Returns `false` when the event is at
    /// capacity or an earlier-entered session is still waiting for a
    /// slot; the session then stays `Waiting` and retries on a later
    /// tick. Idempotent for a session that already holds a slot.
    async fn try_acquire(
        &self,
        event_id: EventId,
        client_id: ClientId,
        entered_at: DateTime<Utc>,
        capacity: u32,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Extend the slot lease for an admitted client. Returns `false` if
    /// the lease no longer exists (already reclaimed or completed).
    async fn heartbeat(&self, event_id: EventId, client_id: ClientId, now: DateTime<Utc>)
    -> Result<bool>;

    /// Mark the lease as an active checkout (the admission token was
    /// consumed); the lease switches to the longer checkout deadline.
    async fn begin_checkout(
        &self,
        event_id: EventId,
        client_id: ClientId,
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// Release the slot after the purchase flow finishes (or abandons
    /// deliberately).
    async fn complete(&self, event_id: EventId, client_id: ClientId) -> Result<()>;

    /// Drop every trace of a client: its lease and any waiter entry. A
    /// stale waiter at the head of the line would otherwise starve the
    /// event, since free slots only go to the earliest waiter.
    async fn forget(&self, event_id: EventId, client_id: ClientId) -> Result<()>;

    /// Free all slots whose lease deadline has passed, and prune waiters
    /// that stopped re-asking. Returns the number of slots reclaimed.
    async fn reclaim_expired(&self, now: DateTime<Utc>) -> Result<u32>;

    /// Number of currently admitted sessions for an event.
    async fn admitted_count(&self, event_id: EventId) -> Result<u32>;
}

#[derive(Clone, Copy, Debug)]
struct SlotLease {
    deadline: DateTime<Utc>,
    checkout_active: bool,
}

#[derive(Default)]
struct EventSlots {
    leases: HashMap<ClientId, SlotLease>,
    /// Sessions at position zero still waiting for a slot, ordered by
    /// entry time; the value is the deadline by which the session must
    /// ask again (refreshed on every `try_acquire`). Earliest entry wins
    /// the next free slot.
    waiters: BTreeMap<(DateTime<Utc>, ClientId), DateTime<Utc>>,
}

/// In-memory coordinator for a single-node deployment.
///
/// All mutation happens under one mutex so check-and-increment is atomic.
pub struct MemoryAdmissionCoordinator {
    events: Mutex<HashMap<EventId, EventSlots>>,
    lease_ttl: Duration,
    checkout_ttl: Duration,
}

impl MemoryAdmissionCoordinator {
    /// Create a coordinator with the given lease and checkout deadlines.
    #[must_use]
    pub fn new(lease_ttl: Duration, checkout_ttl: Duration) -> Self {
        Self {
            events: Mutex::new(HashMap::new()),
            lease_ttl,
            checkout_ttl,
        }
    }
}

impl Default for MemoryAdmissionCoordinator {
    fn default() -> Self {
        Self::new(Duration::seconds(30), Duration::minutes(5))
    }
}

#[async_trait]
impl AdmissionCoordinator for MemoryAdmissionCoordinator {
    async fn try_acquire(
        &self,
        event_id: EventId,
        client_id: ClientId,
        entered_at: DateTime<Utc>,
        capacity: u32,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut events = self.events.lock().await;
        let slots = events.entry(event_id).or_default();

        if slots.leases.contains_key(&client_id) {
            return Ok(true);
        }

        slots
            .waiters
            .insert((entered_at, client_id), now + self.lease_ttl);

        if slots.leases.len() >= capacity as usize {
            return Ok(false);
        }

        // A free slot goes to the earliest waiter; anyone else keeps
        // waiting until the head has been served.
        let head = slots.waiters.keys().next().copied();
        match head {
            Some((_, head_client)) if head_client == client_id => {
                slots.waiters.remove(&(entered_at, client_id));
                slots.leases.insert(
                    client_id,
                    SlotLease {
                        deadline: now + self.lease_ttl,
                        checkout_active: false,
                    },
                );
                tracing::debug!(%event_id, %client_id, admitted = slots.leases.len(), "slot granted");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn heartbeat(
        &self,
        event_id: EventId,
        client_id: ClientId,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut events = self.events.lock().await;
        let Some(slots) = events.get_mut(&event_id) else {
            return Ok(false);
        };
        match slots.leases.get_mut(&client_id) {
            Some(lease) => {
                let ttl = if lease.checkout_active {
                    self.checkout_ttl
                } else {
                    self.lease_ttl
                };
                lease.deadline = now + ttl;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn begin_checkout(
        &self,
        event_id: EventId,
        client_id: ClientId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut events = self.events.lock().await;
        if let Some(lease) = events
            .get_mut(&event_id)
            .and_then(|slots| slots.leases.get_mut(&client_id))
        {
            lease.checkout_active = true;
            lease.deadline = now + self.checkout_ttl;
        }
        Ok(())
    }

    async fn complete(&self, event_id: EventId, client_id: ClientId) -> Result<()> {
        let mut events = self.events.lock().await;
        if let Some(slots) = events.get_mut(&event_id) {
            slots.leases.remove(&client_id);
        }
        Ok(())
    }

    async fn forget(&self, event_id: EventId, client_id: ClientId) -> Result<()> {
        let mut events = self.events.lock().await;
        if let Some(slots) = events.get_mut(&event_id) {
            slots.leases.remove(&client_id);
            slots.waiters.retain(|(_, waiter), _| *waiter != client_id);
        }
        Ok(())
    }

    async fn reclaim_expired(&self, now: DateTime<Utc>) -> Result<u32> {
        let mut events = self.events.lock().await;
        let mut reclaimed = 0;
        for (event_id, slots) in events.iter_mut() {
            let before = slots.leases.len();
            slots.leases.retain(|_, lease| lease.deadline > now);
            let freed = before - slots.leases.len();
            if freed > 0 {
                tracing::info!(%event_id, freed, "reclaimed abandoned admission slots");
            }
            reclaimed += freed;

            // A waiter that stopped re-asking is gone; dropping it keeps
            // the head of the line from starving everyone behind it.
            let waiting_before = slots.waiters.len();
            slots.waiters.retain(|_, deadline| *deadline > now);
            let pruned = waiting_before - slots.waiters.len();
            if pruned > 0 {
                tracing::debug!(%event_id, pruned, "pruned abandoned waiters");
            }
        }
        Ok(u32::try_from(reclaimed).unwrap_or(u32::MAX))
    }

    async fn admitted_count(&self, event_id: EventId) -> Result<u32> {
        let events = self.events.lock().await;
        Ok(events
            .get(&event_id)
            .map_or(0, |slots| u32::try_from(slots.leases.len()).unwrap_or(u32::MAX)))
    }
}
