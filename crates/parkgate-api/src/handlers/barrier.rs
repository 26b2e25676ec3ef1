//! Synchronous barrier triggers

use axum::extract::{Path, State};
use axum::Json;
use parkgate_core::{BarrierAction, BarrierClass, Direction, GateNo};
use serde_json::Value;

use crate::error::ApiError;
use crate::handlers::StatusResponse;
use crate::state::AppState;

type BarrierPath = Path<(String, String)>;

/// GET /api/v2-202402/gate/open-barrier/{direction}/{gate}
pub async fn open_barrier(
    State(state): State<AppState>,
    Path((direction, gate)): BarrierPath,
) -> Result<Json<StatusResponse<Value>>, ApiError> {
    trigger(&state, &direction, &gate, BarrierClass::Gate, BarrierAction::Open).await
}

/// GET /api/v2-202402/gate/close-barrier/{direction}/{gate}
pub async fn close_barrier(
    State(state): State<AppState>,
    Path((direction, gate)): BarrierPath,
) -> Result<Json<StatusResponse<Value>>, ApiError> {
    trigger(&state, &direction, &gate, BarrierClass::Gate, BarrierAction::Close).await
}

/// GET /api/v2-202402/gate/open-zoning/{direction}/{gate}
pub async fn open_zoning(
    State(state): State<AppState>,
    Path((direction, gate)): BarrierPath,
) -> Result<Json<StatusResponse<Value>>, ApiError> {
    trigger(&state, &direction, &gate, BarrierClass::Zone, BarrierAction::Open).await
}

/// GET /api/v2-202402/gate/close-zoning/{direction}/{gate}
pub async fn close_zoning(
    State(state): State<AppState>,
    Path((direction, gate)): BarrierPath,
) -> Result<Json<StatusResponse<Value>>, ApiError> {
    trigger(&state, &direction, &gate, BarrierClass::Zone, BarrierAction::Close).await
}

async fn trigger(
    state: &AppState,
    direction: &str,
    gate: &str,
    class: BarrierClass,
    action: BarrierAction,
) -> Result<Json<StatusResponse<Value>>, ApiError> {
    // Both checks run before anything touches the directory or the wire.
    let direction = Direction::parse_strict(direction)?;
    let gate = GateNo::parse(gate)?;

    state
        .barriers()
        .actuate(direction, class, &gate, action)
        .await?;

    Ok(Json(StatusResponse::ok(action.past_tense(), None)))
}
