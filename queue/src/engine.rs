//! Queue engine: the orchestration layer over the session state machine.
//!
//! The engine owns the runtime store for the session reducer plus every
//! collaborator the HTTP layer needs: the window check on entry, position
//! allocation, the wall-clock ticker input, token consumption, and the
//! cosmetic narrator state. Handlers talk only to the engine; the reducer
//! stays private to it.

use crate::allocator;
use crate::config::ConfigRegistry;
use crate::coordinator::AdmissionCoordinator;
use crate::drain;
use crate::error::{QueueError, Result};
use crate::metrics;
use crate::narrator::{Narrator, NarratorConfig};
use crate::session::{QueueAction, QueueSessionEnvironment, QueueSessionReducer, SessionsState};
use crate::state_store::ClientQueueStateStore;
use crate::tokens::AdmissionTokenStore;
use crate::types::{
    AdmissionToken, ClientId, EventId, EventQueueConfig, QueueCopy, QueuePhase, QueueSession,
};
use crate::window::{self, WindowDecision};
use chrono::{DateTime, Utc};
use hype_queue_core::environment::Clock;
use hype_queue_runtime::Store;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};

type SessionStore =
    Store<SessionsState, QueueAction, QueueSessionEnvironment, QueueSessionReducer>;

/// Client-facing snapshot of one queue session.
///
/// Positions and progress are derived from the wall clock at snapshot
/// time, never stored. When `queue_required` is `false` the client goes
/// straight to the purchase flow and the remaining fields are filler.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Whether the queue gates this client at all
    pub queue_required: bool,
    /// Lifecycle phase
    pub phase: QueuePhase,
    /// Current derived position
    pub position: u32,
    /// Drain progress, 0-100
    pub progress: u8,
    /// Configured drain duration in seconds
    pub duration_secs: u32,
    /// Human wait estimate
    pub estimated_wait: String,
    /// Near-front advisory flag
    pub near_front: bool,
    /// "N people just got through", while its display TTL is live
    pub just_released: Option<u32>,
    /// Admission token, once released and minted
    pub token: Option<AdmissionToken>,
    /// Token expiry, set alongside `token`
    pub token_expires_at: Option<DateTime<Utc>>,
    /// Waiting-page copy
    pub copy: QueueCopy,
}

impl QueueSnapshot {
    fn pass_through(copy: QueueCopy) -> Self {
        Self {
            queue_required: false,
            phase: QueuePhase::Released,
            position: 0,
            progress: 100,
            duration_secs: 0,
            estimated_wait: "any moment now".to_string(),
            near_front: false,
            just_released: None,
            token: None,
            token_expires_at: None,
            copy,
        }
    }
}

/// The queue engine.
///
/// One instance per process; shared behind an `Arc` by the HTTP handlers
/// and the background ticker.
pub struct QueueEngine {
    store: SessionStore,
    configs: Arc<ConfigRegistry>,
    state_store: Arc<dyn ClientQueueStateStore>,
    coordinator: Arc<dyn AdmissionCoordinator>,
    tokens: Arc<dyn AdmissionTokenStore>,
    clock: Arc<dyn Clock>,
    narrators: Mutex<HashMap<(EventId, ClientId), Narrator>>,
    arrivals: StdMutex<HashMap<EventId, u64>>,
    rng: StdMutex<StdRng>,
}

impl QueueEngine {
    /// Assemble the engine and its session store.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        coordinator: Arc<dyn AdmissionCoordinator>,
        state_store: Arc<dyn ClientQueueStateStore>,
        tokens: Arc<dyn AdmissionTokenStore>,
        configs: Arc<ConfigRegistry>,
        grace: Duration,
    ) -> Self {
        Self::with_rng(
            clock,
            coordinator,
            state_store,
            tokens,
            configs,
            grace,
            StdRng::from_entropy(),
        )
    }

    /// Assemble the engine with an explicit RNG, for deterministic
    /// position allocation in tests.
    #[must_use]
    pub fn with_rng(
        clock: Arc<dyn Clock>,
        coordinator: Arc<dyn AdmissionCoordinator>,
        state_store: Arc<dyn ClientQueueStateStore>,
        tokens: Arc<dyn AdmissionTokenStore>,
        configs: Arc<ConfigRegistry>,
        grace: Duration,
        rng: StdRng,
    ) -> Self {
        let environment = QueueSessionEnvironment::new(
            Arc::clone(&clock),
            Arc::clone(&coordinator),
            Arc::clone(&state_store),
            Arc::clone(&tokens),
            Arc::clone(&configs),
            grace,
        );
        let store = Store::new(SessionsState::new(), QueueSessionReducer::new(), environment);

        Self {
            store,
            configs,
            state_store,
            coordinator,
            tokens,
            clock,
            narrators: Mutex::new(HashMap::new()),
            arrivals: StdMutex::new(HashMap::new()),
            rng: StdMutex::new(rng),
        }
    }

    /// Register or replace the queue configuration for an event.
    pub fn register_event(&self, event_id: EventId, config: EventQueueConfig) {
        tracing::info!(%event_id, capacity = config.capacity, "queue config registered");
        self.configs.upsert(event_id, config);
    }

    /// Handle a client arriving at the event page.
    ///
    /// Evaluates the window server-side, then either waves the client
    /// through (`queue_required: false`), returns the snapshot of an
    /// existing session, or allocates a position and creates one.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::UnknownEvent`] when no queue configuration is
    /// registered for the event.
    pub async fn enter(&self, event_id: EventId, client_id: ClientId) -> Result<QueueSnapshot> {
        let config = self
            .configs
            .get(&event_id)
            .ok_or(QueueError::UnknownEvent(event_id))?;
        let now = self.clock.now();

        let already_released = self.has_released(event_id, client_id).await;

        match window::evaluate(&config, already_released, now) {
            WindowDecision::NoQueue => Ok(QueueSnapshot::pass_through(config.copy.clone())),
            WindowDecision::ForcedPreview => {
                // Preview always runs the full cycle: wipe the released
                // record, coordinator state and any live session before
                // entering fresh.
                if let Err(error) = self.reset_preview(event_id, client_id).await {
                    tracing::warn!(%event_id, %client_id, %error, "preview reset failed");
                }
                self.enter_queue(event_id, client_id, &config, now).await
            }
            WindowDecision::MustQueue => self.enter_queue(event_id, client_id, &config, now).await,
        }
    }

    async fn enter_queue(
        &self,
        event_id: EventId,
        client_id: ClientId,
        config: &EventQueueConfig,
        now: DateTime<Utc>,
    ) -> Result<QueueSnapshot> {
        let existing = self
            .store
            .state(move |s| s.get(event_id, client_id).cloned())
            .await;

        if let Some(session) = existing {
            return Ok(self.snapshot(config, &session, now).await);
        }

        let initial_position = self.allocate_position(event_id, config.capacity);
        self.store
            .send(QueueAction::Enter {
                event_id,
                client_id,
                initial_position,
            })
            .await?;
        metrics::record_queue_entered();

        let session = self
            .store
            .state(move |s| s.get(event_id, client_id).cloned())
            .await
            .ok_or(QueueError::SessionNotFound {
                event_id,
                client_id,
            })?;
        Ok(self.snapshot(config, &session, now).await)
    }

    fn allocate_position(&self, event_id: EventId, capacity: u32) -> u32 {
        let arrival_seq = {
            let mut arrivals = self
                .arrivals
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let seq = arrivals.entry(event_id).or_insert(0);
            let current = *seq;
            *seq += 1;
            current
        };
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        allocator::allocate(capacity, arrival_seq, &mut *rng)
    }

    /// Current snapshot for a polling client.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::UnknownEvent`] for an unregistered event and
    /// [`QueueError::SessionNotFound`] for a client with no session and no
    /// released record.
    pub async fn status(&self, event_id: EventId, client_id: ClientId) -> Result<QueueSnapshot> {
        let config = self
            .configs
            .get(&event_id)
            .ok_or(QueueError::UnknownEvent(event_id))?;
        let now = self.clock.now();

        let session = self
            .store
            .state(move |s| s.get(event_id, client_id).cloned())
            .await;

        if let Some(session) = session {
            return Ok(self.snapshot(&config, &session, now).await);
        }

        // No live session but a durable released record: the client came
        // back after a restart. Still released, no new token.
        if self.has_released(event_id, client_id).await {
            let mut snapshot = QueueSnapshot::pass_through(config.copy.clone());
            snapshot.queue_required = true;
            return Ok(snapshot);
        }

        Err(QueueError::SessionNotFound {
            event_id,
            client_id,
        })
    }

    async fn snapshot(
        &self,
        config: &EventQueueConfig,
        session: &QueueSession,
        now: DateTime<Utc>,
    ) -> QueueSnapshot {
        let (position, progress) = match session.phase {
            QueuePhase::Waiting => drain::position_at(
                session.initial_position,
                session.entered_at,
                config.duration_secs,
                now,
            ),
            QueuePhase::Releasing | QueuePhase::Released => (0, 100),
        };

        let drain_rate = if config.duration_secs == 0 {
            0.0
        } else {
            f64::from(session.initial_position) / f64::from(config.duration_secs)
        };
        let narrator_config = NarratorConfig {
            near_front_threshold: config.near_front_threshold,
            ..NarratorConfig::default()
        };
        let feedback = {
            let mut narrators = self.narrators.lock().await;
            narrators
                .entry((session.event_id, session.client_id))
                .or_default()
                .observe(position, drain_rate, now, &narrator_config)
        };

        QueueSnapshot {
            queue_required: true,
            phase: session.phase,
            position,
            progress,
            duration_secs: config.duration_secs,
            estimated_wait: feedback.estimated_wait,
            near_front: feedback.near_front,
            just_released: feedback.just_released,
            token: session.token,
            token_expires_at: session.token_expires_at,
            copy: config.copy.clone(),
        }
    }

    /// Advance every non-released session one tick against the wall clock.
    ///
    /// Called by the background ticker; safe to call at any cadence since
    /// positions derive from elapsed time, not tick counts.
    ///
    /// # Errors
    ///
    /// Propagates a store shutdown error.
    pub async fn tick_all(&self) -> Result<()> {
        let keys = self.store.state(SessionsState::active_keys).await;
        for (event_id, client_id) in keys {
            self.store
                .send(QueueAction::Tick {
                    event_id,
                    client_id,
                })
                .await?;
        }
        Ok(())
    }

    /// Consume an admission token on behalf of the purchase flow.
    ///
    /// On success the client's slot lease switches to the checkout
    /// deadline and the released client id is returned.
    ///
    /// # Errors
    ///
    /// Token errors pass through unchanged; see
    /// [`AdmissionTokenStore::consume`].
    pub async fn consume_token(
        &self,
        event_id: EventId,
        token: AdmissionToken,
    ) -> Result<ClientId> {
        let now = self.clock.now();
        let client_id = match self.tokens.consume(token, event_id, now).await {
            Ok(client_id) => {
                metrics::record_token_consumed("ok");
                client_id
            }
            Err(error) => {
                let status = match &error {
                    QueueError::TokenConsumed => "consumed",
                    QueueError::TokenExpired => "expired",
                    _ => "invalid",
                };
                metrics::record_token_consumed(status);
                return Err(error);
            }
        };

        self.coordinator
            .begin_checkout(event_id, client_id, now)
            .await?;
        tracing::info!(%event_id, %client_id, "admission token consumed, checkout started");
        Ok(client_id)
    }

    /// Release the client's admission slot after checkout finishes.
    ///
    /// # Errors
    ///
    /// Propagates coordinator failures.
    pub async fn complete_checkout(&self, event_id: EventId, client_id: ClientId) -> Result<()> {
        self.coordinator.complete(event_id, client_id).await?;
        metrics::record_checkout_completed();
        Ok(())
    }

    /// Extend the slot lease for an admitted client. Returns `false` when
    /// the lease is gone (reclaimed or completed).
    ///
    /// # Errors
    ///
    /// Propagates coordinator failures.
    pub async fn heartbeat(&self, event_id: EventId, client_id: ClientId) -> Result<bool> {
        self.coordinator
            .heartbeat(event_id, client_id, self.clock.now())
            .await
    }

    /// Reclaim expired slot leases. Returns how many were freed.
    ///
    /// # Errors
    ///
    /// Propagates coordinator failures.
    pub async fn reclaim_expired(&self) -> Result<u32> {
        let reclaimed = self.coordinator.reclaim_expired(self.clock.now()).await?;
        metrics::record_slots_reclaimed(reclaimed);
        Ok(reclaimed)
    }

    /// Admin reset: wipe the durable record and any live session so the
    /// client runs the full queue cycle again.
    ///
    /// # Errors
    ///
    /// Propagates state-store and store failures.
    pub async fn reset_preview(&self, event_id: EventId, client_id: ClientId) -> Result<()> {
        self.state_store.reset(event_id, client_id).await?;
        // Drop any lease or queued waiter entry too; a forgotten waiter
        // left at the head of the line would block the event's grants.
        self.coordinator.forget(event_id, client_id).await?;
        self.store
            .send(QueueAction::ResetPreview {
                event_id,
                client_id,
            })
            .await?;
        Ok(())
    }

    /// Number of currently admitted sessions for an event.
    ///
    /// # Errors
    ///
    /// Propagates coordinator failures.
    pub async fn admitted_count(&self, event_id: EventId) -> Result<u32> {
        self.coordinator.admitted_count(event_id).await
    }

    /// Spawn the observer recording release metrics from the action
    /// broadcast. One grant action is broadcast per released session, so
    /// the counter is exactly-once per release.
    ///
    /// The broadcast carries every action, ticks included, so the
    /// receiver can lag behind under load. Lag skips actions already
    /// overwritten in the channel; only a closed channel ends the task.
    pub fn spawn_release_observer(&self) -> tokio::task::JoinHandle<()> {
        let mut actions = self.store.subscribe_actions();
        tokio::spawn(async move {
            loop {
                match actions.recv().await {
                    Ok(QueueAction::AdmissionGranted {
                        event_id,
                        client_id,
                        ..
                    }) => {
                        metrics::record_session_released();
                        tracing::info!(%event_id, %client_id, "session released");
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "release observer lagged behind the action broadcast");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Gracefully shut down the session store, draining pending effects.
    ///
    /// # Errors
    ///
    /// Returns an error when effects are still pending at the timeout.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.store.shutdown(timeout).await?;
        Ok(())
    }

    async fn has_released(&self, event_id: EventId, client_id: ClientId) -> bool {
        match self.state_store.has_released(event_id, client_id).await {
            Ok(released) => released,
            Err(error) => {
                // Degraded store: admit through the queue rather than
                // denying entry.
                tracing::warn!(%event_id, %client_id, %error, "released lookup failed");
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::coordinator::MemoryAdmissionCoordinator;
    use crate::state_store::MemoryClientQueueStateStore;
    use crate::tokens::MemoryAdmissionTokenStore;
    use crate::types::QueueWindow;
    use hype_queue_testing::{ManualClock, test_clock};

    fn queue_config(capacity: u32) -> EventQueueConfig {
        EventQueueConfig {
            enabled: true,
            window: QueueWindow::AutoAfterAnnouncement {
                announcement_ends_at: test_clock().now(),
            },
            duration_secs: 45,
            capacity,
            forced_preview: false,
            near_front_threshold: 50,
            copy: QueueCopy::default(),
        }
    }

    fn engine_with_clock(clock: ManualClock) -> QueueEngine {
        QueueEngine::with_rng(
            Arc::new(clock),
            Arc::new(MemoryAdmissionCoordinator::default()),
            Arc::new(MemoryClientQueueStateStore::new()),
            Arc::new(MemoryAdmissionTokenStore::default()),
            Arc::new(ConfigRegistry::new()),
            Duration::from_millis(2200),
            StdRng::seed_from_u64(7),
        )
    }

    #[tokio::test]
    async fn enter_unknown_event_is_rejected() {
        let engine = engine_with_clock(ManualClock::new(test_clock().now()));
        let result = engine.enter(EventId::new(), ClientId::new()).await;
        assert!(matches!(result, Err(QueueError::UnknownEvent(_))));
    }

    #[tokio::test]
    async fn enter_allocates_within_the_capacity_scaled_band() {
        let engine = engine_with_clock(ManualClock::new(test_clock().now()));
        let event_id = EventId::new();
        engine.register_event(event_id, queue_config(500));

        let snapshot = engine.enter(event_id, ClientId::new()).await.unwrap();
        assert!(snapshot.queue_required);
        assert_eq!(snapshot.phase, QueuePhase::Waiting);
        // capacity 500 spaces arrivals 1000 apart with jitter under 500
        assert!(
            (1000..1500).contains(&snapshot.position),
            "position {} out of band",
            snapshot.position
        );
    }

    #[tokio::test]
    async fn re_enter_returns_the_same_session() {
        let clock = ManualClock::new(test_clock().now());
        let engine = engine_with_clock(clock.clone());
        let event_id = EventId::new();
        let client_id = ClientId::new();
        engine.register_event(event_id, queue_config(500));

        let first = engine.enter(event_id, client_id).await.unwrap();
        clock.advance(chrono::Duration::seconds(9));
        let second = engine.enter(event_id, client_id).await.unwrap();

        // Same session, drained by the elapsed wall time.
        assert!(second.position < first.position);
        assert_eq!(second.duration_secs, first.duration_secs);
    }

    #[tokio::test]
    async fn disabled_queue_waves_clients_through() {
        let engine = engine_with_clock(ManualClock::new(test_clock().now()));
        let event_id = EventId::new();
        let mut config = queue_config(500);
        config.enabled = false;
        engine.register_event(event_id, config);

        let snapshot = engine.enter(event_id, ClientId::new()).await.unwrap();
        assert!(!snapshot.queue_required);
    }

    #[tokio::test]
    async fn status_without_a_session_is_not_found() {
        let engine = engine_with_clock(ManualClock::new(test_clock().now()));
        let event_id = EventId::new();
        engine.register_event(event_id, queue_config(500));

        let result = engine.status(event_id, ClientId::new()).await;
        assert!(matches!(result, Err(QueueError::SessionNotFound { .. })));
    }

    #[tokio::test]
    async fn release_observer_survives_broadcast_lag() {
        let engine = engine_with_clock(ManualClock::new(test_clock().now()));
        let event_id = EventId::new();
        engine.register_event(event_id, queue_config(500));
        let observer = engine.spawn_release_observer();

        // Far more actions than the broadcast channel holds, so the
        // observer's receiver lags while it waits to be polled.
        for _ in 0..200 {
            engine.enter(event_id, ClientId::new()).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(
            !observer.is_finished(),
            "observer must ride out lag and keep listening for grants"
        );
        observer.abort();
    }

    #[tokio::test]
    async fn position_drains_to_zero_by_the_configured_duration() {
        let clock = ManualClock::new(test_clock().now());
        let engine = engine_with_clock(clock.clone());
        let event_id = EventId::new();
        let client_id = ClientId::new();
        engine.register_event(event_id, queue_config(500));

        engine.enter(event_id, client_id).await.unwrap();
        clock.advance(chrono::Duration::seconds(45));

        let snapshot = engine.status(event_id, client_id).await.unwrap();
        assert_eq!(snapshot.position, 0);
        assert_eq!(snapshot.progress, 100);
    }
}
