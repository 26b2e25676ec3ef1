//! Snapshot endpoints for the gate clients

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use parkgate_core::{CameraSet, Direction, GateNo};
use parkgate_fetch::{DRIVER_HOST_PREFS, DRIVER_SNAPSHOT_PATH, PLATE_HOST_PREFS, PLATE_SNAPSHOT_PATH};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cloud::COLLECT_IMAGE_PATH;
use crate::error::ApiError;
use crate::handlers::{GateQuery, StatusResponse};
use crate::state::AppState;

/// Entrance image record forwarded to the cloud collector
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadImage {
    pub uuid: String,
    pub license_plate: String,
    pub park_code: String,
    pub time_stamp: String,
    pub gate: String,
    pub license_plate_img_base64: Option<String>,
    pub driver_img_base_64: Option<String>,
}

/// POST /api/v2-202401/image/collect-image/{gate_no}
///
/// Attaches the entrance driver picture to the caller's record and relays
/// the collector's answer.
pub async fn collect_image(
    State(state): State<AppState>,
    Path(gate_no): Path<String>,
    body: Result<Json<UploadImage>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let gate = GateNo::parse(&gate_no)
        .map_err(|_| ApiError::BadRequest("invalid gate number".to_string()))?;
    let Json(mut upload) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    upload.gate = Direction::Entrance.short().to_string();
    if upload.park_code.is_empty() {
        upload.park_code = state.parking_code().to_string();
    }

    let driver = state
        .snapshot(
            CameraSet::EntranceDriver,
            &gate,
            DRIVER_HOST_PREFS,
            DRIVER_SNAPSHOT_PATH,
        )
        .await;
    upload.driver_img_base_64 = Some(driver.unwrap_or_default());

    let body = serde_json::to_value(&upload).map_err(|e| ApiError::Internal(e.to_string()))?;
    let reply = state
        .cloud()
        .post_json(COLLECT_IMAGE_PATH, &body)
        .await
        .map_err(|e| {
            warn!(gate = %gate, uuid = %upload.uuid, error = %e, "Collect image failed");
            ApiError::from(e)
        })?;
    debug!(gate = %gate, status = reply.status, "Collector answered");

    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
    Ok((status, Json(reply.body)))
}

/// GET /api/v2-202401/image/get-license-plate-picture?gate_no=N
pub async fn get_license_plate_picture(
    State(state): State<AppState>,
    Query(query): Query<GateQuery>,
) -> Result<Json<StatusResponse<String>>, ApiError> {
    let raw = query
        .gate_no
        .filter(|gate| !gate.is_empty())
        .ok_or_else(|| ApiError::BadRequest("gate_no is required".to_string()))?;
    let gate = GateNo::parse(&raw).map_err(|_| ApiError::BadRequest("invalid gate_no".to_string()))?;

    let picture = state
        .snapshot(CameraSet::ExitAll, &gate, PLATE_HOST_PREFS, PLATE_SNAPSHOT_PATH)
        .await
        .filter(|b64| !b64.is_empty());

    Ok(Json(match picture {
        Some(b64) => StatusResponse::ok("Success", Some(b64)),
        None => StatusResponse::failed("Failed to fetch license plate snapshot"),
    }))
}
