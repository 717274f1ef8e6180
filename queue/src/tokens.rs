//! Admission token store.
//!
//! Tokens are the only artifact the purchase flow may trust as proof of
//! queue completion. They are minted exactly once per released session,
//! carry a short TTL, are scoped to one event, and are consumed atomically
//! at most once. A second consumption attempt fails with a distinct error
//! (the token is never silently re-issued), and a stale token tells the
//! purchase flow to send the client back through the queue.

use crate::error::{QueueError, Result};
use crate::types::{AdmissionToken, ClientId, EventId};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

/// A minted token with its scope and deadline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MintedToken {
    /// The opaque token value handed to the client.
    pub token: AdmissionToken,
    /// Event the token admits to.
    pub event_id: EventId,
    /// Client the token was minted for.
    pub client_id: ClientId,
    /// Hard expiry; stale tokens are rejected.
    pub expires_at: DateTime<Utc>,
}

/// Storage for admission tokens with atomic single-use consumption.
#[async_trait]
pub trait AdmissionTokenStore: Send + Sync {
    /// Mint a token for a released session.
    async fn mint(
        &self,
        event_id: EventId,
        client_id: ClientId,
        now: DateTime<Utc>,
    ) -> Result<MintedToken>;

    /// Atomically consume a token for the given event.
    ///
    /// Returns the client the token was minted for.
    ///
    /// # Errors
    ///
    /// - [`QueueError::TokenInvalid`] if the token was never issued or is
    ///   scoped to a different event
    /// - [`QueueError::TokenConsumed`] on a second consumption attempt
    /// - [`QueueError::TokenExpired`] if the TTL has passed
    async fn consume(
        &self,
        token: AdmissionToken,
        event_id: EventId,
        now: DateTime<Utc>,
    ) -> Result<ClientId>;
}

#[derive(Default)]
struct TokenTables {
    live: HashMap<AdmissionToken, MintedToken>,
    consumed: HashSet<AdmissionToken>,
}

/// In-memory token store.
///
/// One mutex guards both tables so check-and-remove is atomic; consumed
/// token values are kept as tombstones to distinguish replay from garbage.
pub struct MemoryAdmissionTokenStore {
    ttl: Duration,
    tables: Mutex<TokenTables>,
}

impl MemoryAdmissionTokenStore {
    /// Create a store minting tokens with the given TTL.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            tables: Mutex::new(TokenTables::default()),
        }
    }
}

impl Default for MemoryAdmissionTokenStore {
    fn default() -> Self {
        Self::new(Duration::seconds(120))
    }
}

#[async_trait]
impl AdmissionTokenStore for MemoryAdmissionTokenStore {
    async fn mint(
        &self,
        event_id: EventId,
        client_id: ClientId,
        now: DateTime<Utc>,
    ) -> Result<MintedToken> {
        let minted = MintedToken {
            token: AdmissionToken::new(),
            event_id,
            client_id,
            expires_at: now + self.ttl,
        };

        let mut tables = self.tables.lock().await;
        tables.live.insert(minted.token, minted);
        Ok(minted)
    }

    async fn consume(
        &self,
        token: AdmissionToken,
        event_id: EventId,
        now: DateTime<Utc>,
    ) -> Result<ClientId> {
        let mut tables = self.tables.lock().await;

        let Some(minted) = tables.live.get(&token).copied() else {
            if tables.consumed.contains(&token) {
                return Err(QueueError::TokenConsumed);
            }
            return Err(QueueError::TokenInvalid);
        };

        // Wrong-event use neither consumes nor reveals the token.
        if minted.event_id != event_id {
            return Err(QueueError::TokenInvalid);
        }

        tables.live.remove(&token);
        tables.consumed.insert(token);

        if minted.expires_at <= now {
            return Err(QueueError::TokenExpired);
        }

        Ok(minted.client_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use hype_queue_core::environment::{Clock, SystemClock};

    #[tokio::test]
    async fn consume_once_succeeds_twice_fails() {
        let store = MemoryAdmissionTokenStore::default();
        let event = EventId::new();
        let client = ClientId::new();
        let now = SystemClock.now();

        let minted = store.mint(event, client, now).await.unwrap();
        assert_eq!(store.consume(minted.token, event, now).await.unwrap(), client);

        assert!(matches!(
            store.consume(minted.token, event, now).await,
            Err(QueueError::TokenConsumed)
        ));
    }

    #[tokio::test]
    async fn unknown_token_is_invalid() {
        let store = MemoryAdmissionTokenStore::default();
        let now = SystemClock.now();
        assert!(matches!(
            store.consume(AdmissionToken::new(), EventId::new(), now).await,
            Err(QueueError::TokenInvalid)
        ));
    }

    #[tokio::test]
    async fn token_is_scoped_to_its_event() {
        let store = MemoryAdmissionTokenStore::default();
        let event_a = EventId::new();
        let event_b = EventId::new();
        let now = SystemClock.now();

        let minted = store.mint(event_a, ClientId::new(), now).await.unwrap();

        // Completing the queue for event A never admits to event B,
        // and the failed attempt must not burn the token.
        assert!(matches!(
            store.consume(minted.token, event_b, now).await,
            Err(QueueError::TokenInvalid)
        ));
        assert!(store.consume(minted.token, event_a, now).await.is_ok());
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let store = MemoryAdmissionTokenStore::new(Duration::seconds(120));
        let event = EventId::new();
        let now = SystemClock.now();

        let minted = store.mint(event, ClientId::new(), now).await.unwrap();

        assert!(matches!(
            store
                .consume(minted.token, event, now + Duration::seconds(121))
                .await,
            Err(QueueError::TokenExpired)
        ));
    }
}
