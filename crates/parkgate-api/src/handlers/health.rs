//! Liveness endpoint

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

/// GET /healthz
///
/// Reports the live WebSocket groups; 503 once the hub has stopped.
pub async fn healthz(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let groups = state
        .hub()
        .group_sizes()
        .await
        .map_err(|e| ApiError::ServiceUnavailable(e.to_string()))?;

    Ok(Json(json!({
        "status": "ok",
        "groups": groups,
    })))
}
