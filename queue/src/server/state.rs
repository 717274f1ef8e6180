//! Application state for the queue HTTP server.

use crate::engine::QueueEngine;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// The engine is the single entry point to the queue; handlers never
/// touch the session store or the coordinator directly.
#[derive(Clone)]
pub struct AppState {
    /// The queue engine
    pub engine: Arc<QueueEngine>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(engine: Arc<QueueEngine>) -> Self {
        Self { engine }
    }
}
