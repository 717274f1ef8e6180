//! # Hype Queue Runtime
//!
//! Runtime for the hype-queue admission engine: the [`Store`] owns reducer
//! state, executes effect descriptions on tokio, and broadcasts every
//! processed action to observers.
//!
//! The store is deliberately small. The queue engine needs exactly three
//! things from its runtime:
//!
//! - serialized state transitions (one write lock around each `reduce`)
//! - effect execution for `Delay` (grace windows, scheduled ticks) and
//!   `Future` (async collaborators such as the admission coordinator)
//! - an action broadcast so the HTTP layer and release listeners can
//!   observe transitions without holding the state lock
//!
//! Shutdown is cooperative: once [`Store::shutdown`] is called no new
//! actions are accepted, and the call waits for in-flight effects to
//! drain before returning.

pub mod retry;

pub use retry::{RetryError, RetryPolicy, retry_with_backoff};

use hype_queue_core::effect::Effect;
use hype_queue_core::reducer::Reducer;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, broadcast};

/// Errors surfaced by the [`Store`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store is shutting down and no longer accepts actions.
    #[error("store is shutting down")]
    ShuttingDown,

    /// Shutdown timed out with effects still in flight.
    #[error("shutdown timed out with {pending} effects still pending")]
    ShutdownTimeout {
        /// Number of effects still pending at timeout.
        pending: usize,
    },
}

/// Configuration for a [`Store`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Capacity of the action broadcast channel.
    pub broadcast_capacity: usize,
    /// Poll interval used while waiting for effects to drain on shutdown.
    pub shutdown_poll_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 64,
            shutdown_poll_interval: Duration::from_millis(10),
        }
    }
}

/// The store: owns state, runs the reducer, executes effects.
///
/// Cloning a `Store` is cheap and produces a handle to the same state;
/// effect tasks hold such handles to feed produced actions back in.
pub struct Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    state: Arc<RwLock<S>>,
    reducer: Arc<R>,
    environment: Arc<E>,
    shutdown: Arc<AtomicBool>,
    pending_effects: Arc<AtomicUsize>,
    action_broadcast: broadcast::Sender<A>,
    config: StoreConfig,
}

impl<S, A, E, R> Clone for Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            reducer: Arc::clone(&self.reducer),
            environment: Arc::clone(&self.environment),
            shutdown: Arc::clone(&self.shutdown),
            pending_effects: Arc::clone(&self.pending_effects),
            action_broadcast: self.action_broadcast.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S, A, E, R> Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
    A: Send + Clone + std::fmt::Debug + 'static,
    S: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Create a new store with initial state, reducer, and environment.
    #[must_use]
    pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
        Self::with_config(initial_state, reducer, environment, StoreConfig::default())
    }

    /// Create a new store with custom configuration.
    #[must_use]
    pub fn with_config(initial_state: S, reducer: R, environment: E, config: StoreConfig) -> Self {
        let (action_broadcast, _) = broadcast::channel(config.broadcast_capacity);
        Self {
            state: Arc::new(RwLock::new(initial_state)),
            reducer: Arc::new(reducer),
            environment: Arc::new(environment),
            shutdown: Arc::new(AtomicBool::new(false)),
            pending_effects: Arc::new(AtomicUsize::new(0)),
            action_broadcast,
            config,
        }
    }

    /// Dispatch an action: run the reducer, broadcast the action, and
    /// spawn the returned effects.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShuttingDown`] if the store has been shut down.
    pub async fn send(&self, action: A) -> Result<(), StoreError> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(StoreError::ShuttingDown);
        }

        let effects = {
            let mut state = self.state.write().await;
            self.reducer
                .reduce(&mut state, action.clone(), &self.environment)
        };

        // Observers may lag or be absent; neither is an error.
        let _ = self.action_broadcast.send(action);

        for effect in effects {
            self.spawn_effect(effect);
        }

        Ok(())
    }

    /// Read the current state through a closure, without cloning it.
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&S) -> T,
    {
        let state = self.state.read().await;
        f(&state)
    }

    /// Subscribe to all actions processed by this store.
    ///
    /// Every action that passes through the reducer (including actions fed
    /// back from effects) is broadcast to subscribers.
    #[must_use]
    pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
        self.action_broadcast.subscribe()
    }

    /// Number of effects currently in flight.
    #[must_use]
    pub fn pending_effects(&self) -> usize {
        self.pending_effects.load(Ordering::SeqCst)
    }

    /// Shut the store down: refuse new actions, then wait up to `timeout`
    /// for in-flight effects to finish.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if effects are still
    /// pending when the timeout elapses.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
        self.shutdown.store(true, Ordering::SeqCst);

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let pending = self.pending_effects.load(Ordering::SeqCst);
            if pending == 0 {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(StoreError::ShutdownTimeout { pending });
            }
            tokio::time::sleep(self.config.shutdown_poll_interval).await;
        }
    }

    fn spawn_effect(&self, effect: Effect<A>) {
        match effect {
            Effect::None => {}
            Effect::Parallel(effects) => {
                for effect in effects {
                    self.spawn_effect(effect);
                }
            }
            Effect::Delay { duration, action } => {
                let store = self.clone();
                store.pending_effects.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let _guard = PendingGuard(Arc::clone(&store.pending_effects));
                    tokio::time::sleep(duration).await;
                    store.feed_back(*action).await;
                });
            }
            Effect::Future(future) => {
                let store = self.clone();
                store.pending_effects.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let _guard = PendingGuard(Arc::clone(&store.pending_effects));
                    if let Some(action) = future.await {
                        store.feed_back(action).await;
                    }
                });
            }
        }
    }

    async fn feed_back(&self, action: A) {
        if let Err(err) = self.send(action).await {
            tracing::warn!(error = %err, "effect action dropped");
        }
    }
}

/// Decrements the pending-effect counter when an effect task finishes,
/// including on panic.
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use hype_queue_core::smallvec;

    #[derive(Clone, Debug, Default)]
    struct CounterState {
        count: i64,
    }

    #[derive(Clone, Debug)]
    enum CounterAction {
        Increment,
        IncrementLater(Duration),
        IncrementAsync,
    }

    struct CounterEnv;

    #[derive(Clone)]
    struct CounterReducer;

    impl Reducer for CounterReducer {
        type State = CounterState;
        type Action = CounterAction;
        type Environment = CounterEnv;

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> hype_queue_core::SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                CounterAction::Increment => {
                    state.count += 1;
                    smallvec![]
                }
                CounterAction::IncrementLater(duration) => {
                    smallvec![Effect::Delay {
                        duration,
                        action: Box::new(CounterAction::Increment),
                    }]
                }
                CounterAction::IncrementAsync => {
                    smallvec![Effect::Future(Box::pin(async {
                        Some(CounterAction::Increment)
                    }))]
                }
            }
        }
    }

    #[tokio::test]
    async fn send_updates_state() {
        let store = Store::new(CounterState::default(), CounterReducer, CounterEnv);
        store.send(CounterAction::Increment).await.unwrap();
        assert_eq!(store.state(|s| s.count).await, 1);
    }

    #[tokio::test]
    async fn delay_effect_feeds_back() {
        let store = Store::new(CounterState::default(), CounterReducer, CounterEnv);
        store
            .send(CounterAction::IncrementLater(Duration::from_millis(20)))
            .await
            .unwrap();
        assert_eq!(store.state(|s| s.count).await, 0);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(store.state(|s| s.count).await, 1);
    }

    #[tokio::test]
    async fn future_effect_feeds_back() {
        let store = Store::new(CounterState::default(), CounterReducer, CounterEnv);
        store.send(CounterAction::IncrementAsync).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.state(|s| s.count).await, 1);
    }

    #[tokio::test]
    async fn broadcast_carries_fed_back_actions() {
        let store = Store::new(CounterState::default(), CounterReducer, CounterEnv);
        let mut actions = store.subscribe_actions();
        store.send(CounterAction::IncrementAsync).await.unwrap();

        // First the command itself, then the fed-back increment.
        assert!(matches!(
            actions.recv().await.unwrap(),
            CounterAction::IncrementAsync
        ));
        assert!(matches!(
            actions.recv().await.unwrap(),
            CounterAction::Increment
        ));
    }

    #[tokio::test]
    async fn shutdown_refuses_new_actions() {
        let store = Store::new(CounterState::default(), CounterReducer, CounterEnv);
        store.shutdown(Duration::from_millis(100)).await.unwrap();
        assert!(matches!(
            store.send(CounterAction::Increment).await,
            Err(StoreError::ShuttingDown)
        ));
    }
}
