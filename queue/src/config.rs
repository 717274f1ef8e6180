//! Configuration management for the queue service.
//!
//! Process-level settings load from environment variables with sensible
//! defaults. Per-event queue configuration lives in [`ConfigRegistry`],
//! which admin tooling writes and the engine reads.

use crate::types::{EventId, EventQueueConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::sync::{PoisonError, RwLock};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Queue engine tunables
    pub queue: QueueSettings,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

/// Queue engine tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Server-side tick interval in milliseconds
    pub tick_interval_ms: u64,
    /// Grace window between slot grant and final release, in milliseconds
    pub grace_ms: u64,
    /// Admission token TTL in seconds
    pub token_ttl_secs: u64,
    /// Capacity slot lease TTL in seconds; a silent client loses its slot
    /// after this long without a heartbeat
    pub slot_lease_secs: u64,
    /// Checkout TTL in seconds; an admitted client holds its slot this long
    /// while purchasing
    pub checkout_ttl_secs: u64,
    /// How often expired leases are reclaimed, in seconds
    pub reclaim_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(8080),
                log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
                shutdown_timeout: env::var("SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            },
            queue: QueueSettings {
                tick_interval_ms: env::var("QUEUE_TICK_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
                grace_ms: env::var("QUEUE_GRACE_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2200),
                token_ttl_secs: env::var("QUEUE_TOKEN_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
                slot_lease_secs: env::var("QUEUE_SLOT_LEASE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
                checkout_ttl_secs: env::var("QUEUE_CHECKOUT_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
                reclaim_interval_secs: env::var("QUEUE_RECLAIM_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            },
        }
    }
}

/// Registry of per-event queue configurations.
///
/// Written by admin endpoints, read synchronously by the release state
/// machine on every tick. A plain `RwLock` keeps reads cheap and available
/// from non-async code.
#[derive(Debug, Default)]
pub struct ConfigRegistry {
    configs: RwLock<HashMap<EventId, EventQueueConfig>>,
}

impl ConfigRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the configuration for an event.
    pub fn upsert(&self, event_id: EventId, config: EventQueueConfig) {
        self.configs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event_id, config);
    }

    /// Fetch the configuration for an event, if one is registered.
    #[must_use]
    pub fn get(&self, event_id: &EventId) -> Option<EventQueueConfig> {
        self.configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_id)
            .cloned()
    }

    /// Whether the event has a registered configuration.
    #[must_use]
    pub fn contains(&self, event_id: &EventId) -> bool {
        self.configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(event_id)
    }

    /// Registered event ids.
    #[must_use]
    pub fn event_ids(&self) -> Vec<EventId> {
        self.configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{QueueCopy, QueueWindow};

    fn sample_config() -> EventQueueConfig {
        EventQueueConfig {
            enabled: true,
            window: QueueWindow::Disabled,
            duration_secs: 45,
            capacity: 500,
            forced_preview: false,
            near_front_threshold: 50,
            copy: QueueCopy::default(),
        }
    }

    #[test]
    fn registry_upsert_and_get() {
        let registry = ConfigRegistry::new();
        let event = EventId::new();
        assert!(registry.get(&event).is_none());

        registry.upsert(event, sample_config());
        assert!(registry.contains(&event));
        assert_eq!(registry.get(&event).unwrap().capacity, 500);
    }

    #[test]
    fn upsert_replaces_existing() {
        let registry = ConfigRegistry::new();
        let event = EventId::new();
        registry.upsert(event, sample_config());

        let mut updated = sample_config();
        updated.capacity = 750;
        registry.upsert(event, updated);

        assert_eq!(registry.get(&event).unwrap().capacity, 750);
    }

    #[test]
    fn defaults_are_applied_without_env() {
        let config = Config::from_env();
        assert_eq!(config.queue.grace_ms, 2200);
        assert_eq!(config.queue.token_ttl_secs, 120);
    }
}
