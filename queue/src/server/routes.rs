//! Router configuration for the queue service.
//!
//! Builds the complete Axum router with all endpoints.

use super::health::{health_check, readiness_check};
use super::state::AppState;
use crate::api::{admin, admission, queue};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Build the complete Axum router.
///
/// Configures all routes:
/// - Health checks
/// - Client-facing queue endpoints
/// - Admission endpoints for the purchase flow
/// - Admin endpoints for queue configuration
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Client-facing queue flow
        .route("/events/:event_id/queue/enter", post(queue::enter))
        .route("/events/:event_id/queue/status", get(queue::status))
        .route("/events/:event_id/queue/heartbeat", post(queue::heartbeat))
        // Purchase-flow admission
        .route("/admission/consume", post(admission::consume))
        .route("/admission/complete", post(admission::complete))
        // Admin configuration
        .route(
            "/admin/events/:event_id/queue",
            put(admin::upsert_queue_config),
        )
        .route(
            "/admin/events/:event_id/queue/reset",
            post(admin::reset_queue_state),
        );

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api", api_routes)
        .with_state(state)
}
