//! Admin endpoints for queue configuration.
//!
//! - PUT  /api/admin/events/:event_id/queue - register or replace the
//!   queue configuration for an event
//! - POST /api/admin/events/:event_id/queue/reset - wipe one client's
//!   queue state so a preview run starts fresh

use crate::server::error::AppError;
use crate::server::state::AppState;
use crate::types::{ClientId, EventId, EventQueueConfig};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

/// Register or replace the queue configuration for an event.
///
/// Takes effect on the next tick; live sessions keep their allocated
/// positions but drain against the new duration.
pub async fn upsert_queue_config(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(config): Json<EventQueueConfig>,
) -> StatusCode {
    state
        .engine
        .register_event(EventId::from_uuid(event_id), config);
    StatusCode::NO_CONTENT
}

/// Request to reset one client's queue state.
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    /// Client to reset
    pub client_id: Uuid,
}

/// Wipe the durable record and any live session for a client.
pub async fn reset_queue_state(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(request): Json<ResetRequest>,
) -> Result<StatusCode, AppError> {
    state
        .engine
        .reset_preview(
            EventId::from_uuid(event_id),
            ClientId::from_uuid(request.client_id),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
