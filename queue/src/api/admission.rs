//! Admission endpoints for the purchase flow.
//!
//! - POST /api/admission/consume - redeem an admission token
//! - POST /api/admission/complete - free the slot after checkout
//!
//! These are server-to-server calls: the storefront backend redeems the
//! token it received from the released client before letting the purchase
//! proceed. Consumption is strictly single-use; a replayed token gets
//! 409, an expired one 410.

use crate::server::error::AppError;
use crate::server::state::AppState;
use crate::types::{AdmissionToken, ClientId, EventId};
use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to consume an admission token.
#[derive(Debug, Deserialize)]
pub struct ConsumeRequest {
    /// Event the purchase targets
    pub event_id: Uuid,
    /// The token handed to the released client
    pub token: Uuid,
}

/// Response after a successful consumption.
#[derive(Debug, Serialize)]
pub struct ConsumeResponse {
    /// The client the token was minted for
    pub client_id: Uuid,
}

/// Redeem an admission token, exactly once.
pub async fn consume(
    State(state): State<AppState>,
    Json(request): Json<ConsumeRequest>,
) -> Result<Json<ConsumeResponse>, AppError> {
    let client_id = state
        .engine
        .consume_token(
            EventId::from_uuid(request.event_id),
            AdmissionToken::from_uuid(request.token),
        )
        .await?;
    Ok(Json(ConsumeResponse {
        client_id: *client_id.as_uuid(),
    }))
}

/// Request to complete a checkout.
#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    /// Event the purchase targeted
    pub event_id: Uuid,
    /// Client whose slot is freed
    pub client_id: Uuid,
}

/// Free the admission slot after the purchase finishes (or is abandoned
/// deliberately).
pub async fn complete(
    State(state): State<AppState>,
    Json(request): Json<CompleteRequest>,
) -> Result<StatusCode, AppError> {
    state
        .engine
        .complete_checkout(
            EventId::from_uuid(request.event_id),
            ClientId::from_uuid(request.client_id),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
