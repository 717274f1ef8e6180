//! Client-facing queue endpoints.
//!
//! - POST /api/events/:event_id/queue/enter - join (or rejoin) the queue
//! - GET  /api/events/:event_id/queue/status - poll the current snapshot
//! - POST /api/events/:event_id/queue/heartbeat - keep an admission slot
//!   alive while on the purchase page

use crate::engine::QueueSnapshot;
use crate::server::error::AppError;
use crate::server::state::AppState;
use crate::types::{ClientId, EventId};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to enter the queue.
#[derive(Debug, Deserialize)]
pub struct EnterRequest {
    /// Client identifier (one per browser/device)
    pub client_id: Uuid,
}

/// Join the queue for an event.
///
/// Idempotent: re-entering with a live session returns its current
/// snapshot instead of allocating a new position.
pub async fn enter(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(request): Json<EnterRequest>,
) -> Result<Json<QueueSnapshot>, AppError> {
    let snapshot = state
        .engine
        .enter(
            EventId::from_uuid(event_id),
            ClientId::from_uuid(request.client_id),
        )
        .await?;
    Ok(Json(snapshot))
}

/// Query parameters for status polling.
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    /// Client identifier
    pub client_id: Uuid,
}

/// Poll the authoritative queue snapshot for a client.
pub async fn status(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<QueueSnapshot>, AppError> {
    let snapshot = state
        .engine
        .status(
            EventId::from_uuid(event_id),
            ClientId::from_uuid(query.client_id),
        )
        .await?;
    Ok(Json(snapshot))
}

/// Request to extend an admission slot lease.
#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    /// Client identifier
    pub client_id: Uuid,
}

/// Heartbeat response.
#[derive(Debug, Serialize)]
pub struct HeartbeatResponse {
    /// Whether the slot lease is still held
    pub alive: bool,
}

/// Extend the slot lease for an admitted client.
///
/// `alive: false` means the slot was reclaimed (or the checkout already
/// completed); the client should go back through the queue.
pub async fn heartbeat(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(request): Json<HeartbeatRequest>,
) -> Result<Json<HeartbeatResponse>, AppError> {
    let alive = state
        .engine
        .heartbeat(
            EventId::from_uuid(event_id),
            ClientId::from_uuid(request.client_id),
        )
        .await?;
    Ok(Json(HeartbeatResponse { alive }))
}
