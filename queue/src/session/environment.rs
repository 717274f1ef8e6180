//! Environment for the queue session reducer.

use crate::config::ConfigRegistry;
use crate::coordinator::AdmissionCoordinator;
use crate::state_store::ClientQueueStateStore;
use crate::tokens::AdmissionTokenStore;
use hype_queue_core::environment::Clock;
use std::sync::Arc;
use std::time::Duration;

/// Injected dependencies for the session reducer.
///
/// The reducer reads the clock and per-event configuration synchronously;
/// the async collaborators are cloned into `Effect::Future` closures.
#[derive(Clone)]
pub struct QueueSessionEnvironment {
    clock: Arc<dyn Clock>,
    coordinator: Arc<dyn AdmissionCoordinator>,
    state_store: Arc<dyn ClientQueueStateStore>,
    tokens: Arc<dyn AdmissionTokenStore>,
    configs: Arc<ConfigRegistry>,
    grace: Duration,
}

impl QueueSessionEnvironment {
    /// Assemble the environment.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        coordinator: Arc<dyn AdmissionCoordinator>,
        state_store: Arc<dyn ClientQueueStateStore>,
        tokens: Arc<dyn AdmissionTokenStore>,
        configs: Arc<ConfigRegistry>,
        grace: Duration,
    ) -> Self {
        Self {
            clock,
            coordinator,
            state_store,
            tokens,
            configs,
            grace,
        }
    }

    /// Clock for all time reads.
    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Shared handle to the admission coordinator.
    #[must_use]
    pub fn coordinator(&self) -> Arc<dyn AdmissionCoordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Shared handle to the durable client-state store.
    #[must_use]
    pub fn state_store(&self) -> Arc<dyn ClientQueueStateStore> {
        Arc::clone(&self.state_store)
    }

    /// Shared handle to the admission token store.
    #[must_use]
    pub fn tokens(&self) -> Arc<dyn AdmissionTokenStore> {
        Arc::clone(&self.tokens)
    }

    /// Per-event queue configuration registry.
    #[must_use]
    pub fn configs(&self) -> &ConfigRegistry {
        self.configs.as_ref()
    }

    /// Grace window between slot grant and final release.
    #[must_use]
    pub const fn grace(&self) -> Duration {
        self.grace
    }
}
