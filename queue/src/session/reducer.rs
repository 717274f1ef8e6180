//! Reducer for the queue session release state machine.

use crate::drain;
use crate::session::actions::QueueAction;
use crate::session::environment::QueueSessionEnvironment;
use crate::session::types::SessionsState;
use crate::types::{ClientId, EventId, QueuePhase, QueueSession};
use hype_queue_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};

/// State machine for queue sessions.
///
/// Pure over [`SessionsState`]; the clock, the admission coordinator, the
/// durable state store and the token store are reached only through
/// returned effects, so every transition is testable without a runtime.
pub struct QueueSessionReducer;

impl QueueSessionReducer {
    /// Create the reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Finalize `Releasing → Released`.
    ///
    /// The phase guard makes this idempotent: the grace-delay action and a
    /// recovering tick can both land here, but only the first one minting
    /// runs the release effects.
    fn finalize_release(
        state: &mut SessionsState,
        env: &QueueSessionEnvironment,
        event_id: EventId,
        client_id: ClientId,
    ) -> SmallVec<[Effect<QueueAction>; 4]> {
        let now = env.clock().now();
        let Some(session) = state.get_mut(event_id, client_id) else {
            return smallvec![Effect::None];
        };
        if session.phase != QueuePhase::Releasing {
            return smallvec![Effect::None];
        }

        session.phase = QueuePhase::Released;
        session.released_at = Some(now);

        let store = env.state_store();
        let tokens = env.tokens();
        smallvec![Effect::Future(Box::pin(async move {
            if let Err(error) = store.record_released(event_id, client_id).await {
                tracing::warn!(%event_id, %client_id, %error, "failed to persist release");
            }
            match tokens.mint(event_id, client_id, now).await {
                Ok(minted) => Some(QueueAction::AdmissionGranted {
                    event_id,
                    client_id,
                    token: minted.token,
                    expires_at: minted.expires_at,
                }),
                Err(error) => {
                    tracing::error!(%event_id, %client_id, %error, "failed to mint admission token");
                    None
                }
            }
        }))]
    }
}

impl Default for QueueSessionReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl Reducer for QueueSessionReducer {
    type State = SessionsState;
    type Action = QueueAction;
    type Environment = QueueSessionEnvironment;

    #[allow(clippy::too_many_lines)] // one match arm per lifecycle transition
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            QueueAction::Enter {
                event_id,
                client_id,
                initial_position,
            } => {
                // Re-entry with a live session is a no-op; the caller gets
                // the current snapshot, never a fresh position.
                if state.get(event_id, client_id).is_some() {
                    return smallvec![Effect::None];
                }

                let now = env.clock().now();
                state.insert(QueueSession::new(event_id, client_id, now, initial_position));
                tracing::info!(%event_id, %client_id, initial_position, "queue entered");

                let store = env.state_store();
                smallvec![Effect::Future(Box::pin(async move {
                    // Entry persistence is best effort; a store outage must
                    // never block admission.
                    if let Err(error) = store.record_entered(event_id, client_id).await {
                        tracing::warn!(%event_id, %client_id, %error, "failed to persist queue entry");
                    }
                    None
                }))]
            }

            QueueAction::Tick {
                event_id,
                client_id,
            } => {
                let now = env.clock().now();
                let grace = env.grace();
                let Some(session) = state.get_mut(event_id, client_id) else {
                    return smallvec![Effect::None];
                };

                match session.phase {
                    QueuePhase::Waiting => {
                        let Some(config) = env.configs().get(&event_id) else {
                            return smallvec![Effect::None];
                        };
                        let (position, _) = drain::position_at(
                            session.initial_position,
                            session.entered_at,
                            config.duration_secs,
                            now,
                        );
                        if position > 0 || session.acquire_pending {
                            return smallvec![Effect::None];
                        }

                        session.acquire_pending = true;
                        let entered_at = session.entered_at;
                        let capacity = config.capacity;
                        let coordinator = env.coordinator();
                        smallvec![Effect::Future(Box::pin(async move {
                            match coordinator
                                .try_acquire(event_id, client_id, entered_at, capacity, now)
                                .await
                            {
                                Ok(true) => Some(QueueAction::ReleaseStarted {
                                    event_id,
                                    client_id,
                                    at: now,
                                }),
                                Ok(false) => {
                                    Some(QueueAction::ReleaseDeferred { event_id, client_id })
                                }
                                Err(error) => {
                                    tracing::warn!(%event_id, %client_id, %error, "slot acquisition failed");
                                    Some(QueueAction::ReleaseDeferred { event_id, client_id })
                                }
                            }
                        }))]
                    }
                    QueuePhase::Releasing => {
                        // Recovery path for a lost grace delay (e.g. state
                        // rebuilt after a restart mid-release).
                        let grace_ms = i64::try_from(grace.as_millis()).unwrap_or(i64::MAX);
                        let elapsed = session
                            .releasing_since
                            .map(|since| now.signed_duration_since(since));
                        if elapsed
                            .is_some_and(|e| e >= chrono::Duration::milliseconds(grace_ms))
                        {
                            Self::finalize_release(state, env, event_id, client_id)
                        } else {
                            smallvec![Effect::None]
                        }
                    }
                    QueuePhase::Released => smallvec![Effect::None],
                }
            }

            QueueAction::ReleaseStarted {
                event_id,
                client_id,
                at,
            } => {
                let Some(session) = state.get_mut(event_id, client_id) else {
                    return smallvec![Effect::None];
                };
                // Phase guard: a second grant for an already-releasing or
                // released session changes nothing.
                if session.phase != QueuePhase::Waiting {
                    return smallvec![Effect::None];
                }

                session.phase = QueuePhase::Releasing;
                session.releasing_since = Some(at);
                session.acquire_pending = false;
                tracing::info!(%event_id, %client_id, "release started");

                smallvec![Effect::Delay {
                    duration: env.grace(),
                    action: Box::new(QueueAction::CompleteRelease { event_id, client_id }),
                }]
            }

            QueueAction::ReleaseDeferred {
                event_id,
                client_id,
            } => {
                if let Some(session) = state.get_mut(event_id, client_id) {
                    session.acquire_pending = false;
                }
                smallvec![Effect::None]
            }

            QueueAction::CompleteRelease {
                event_id,
                client_id,
            } => Self::finalize_release(state, env, event_id, client_id),

            QueueAction::AdmissionGranted {
                event_id,
                client_id,
                token,
                expires_at,
            } => {
                if let Some(session) = state.get_mut(event_id, client_id) {
                    session.token = Some(token);
                    session.token_expires_at = Some(expires_at);
                }
                smallvec![Effect::None]
            }

            QueueAction::ResetPreview {
                event_id,
                client_id,
            } => {
                if state.remove(event_id, client_id).is_none() {
                    return smallvec![Effect::None];
                }
                tracing::info!(%event_id, %client_id, "preview session reset");

                let store = env.state_store();
                smallvec![Effect::Future(Box::pin(async move {
                    if let Err(error) = store.reset(event_id, client_id).await {
                        tracing::warn!(%event_id, %client_id, %error, "failed to reset persisted state");
                    }
                    None
                }))]
            }
        }
    }
}
