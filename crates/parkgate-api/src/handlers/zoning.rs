//! Zoning barrier webhooks
//!
//! Inner zones have their own cameras. A plate read at a zone barrier is
//! reported to the cloud as a zone transition and relayed to the zone's
//! display room.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{Local, SecondsFormat};
use parkgate_core::{vehicle_type_id, Direction, GateNo, SignPanel};
use parkgate_sign::SignMode;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::cloud::{ZONING_COLLECT_IMAGE_PATH, ZONING_TRANSITION_PATH};
use crate::error::ApiError;
use crate::event::{read_upload, to_base64, CameraUpload, PlateEvent};
use crate::handlers::order::{gate_from_query, parse_event, DUPLICATE_IGNORED, UPLOAD_OK};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ZoningQuery {
    pub gate_no: Option<String>,
    /// Zone the vehicle moves into when leaving through an exit barrier
    pub next_zone: Option<String>,
}

/// POST /api/v2-202402/zoning/entrance/{zoning_code}?gate_no=N
pub async fn zoning_entrance(
    State(state): State<AppState>,
    Path(zoning_code): Path<String>,
    Query(query): Query<ZoningQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    handle(state, Direction::Entrance, zoning_code, query, multipart).await
}

/// POST /api/v2-202402/zoning/exit/{zoning_code}?gate_no=N&next_zone=Z
pub async fn zoning_exit(
    State(state): State<AppState>,
    Path(zoning_code): Path<String>,
    Query(query): Query<ZoningQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    handle(state, Direction::Exit, zoning_code, query, multipart).await
}

/// Display room of a zoning barrier, e.g. `entrance:ZONE07:2`
pub fn zoning_room(direction: Direction, zoning_code: &str, gate: &GateNo) -> String {
    let side = match direction {
        Direction::Entrance => "entrance",
        Direction::Exit => "exit",
    };
    format!("{side}:{zoning_code}:{gate}")
}

async fn handle(
    state: AppState,
    direction: Direction,
    zoning_code: String,
    query: ZoningQuery,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let gate = gate_from_query(query.gate_no.as_deref())?;

    let upload = read_upload(multipart, true).await?;
    let event = parse_event(&upload.xml)?;
    let room = zoning_room(direction, &zoning_code, &gate);

    // Unreadable plates are never suppressed; each one is a separate vehicle.
    if !event.is_unreadable() && state.is_duplicate(&format!("{room}|{}", event.plate)) {
        debug!(%room, plate = %event.plate, "Duplicate zoning event");
        return Ok((StatusCode::OK, DUPLICATE_IGNORED).into_response());
    }
    info!(%room, plate = %event.plate, "Zoning event");

    state.report_sighting(&event.plate, &event.ip_address);

    if event.is_unreadable() {
        let payload = json!({
            "status": false,
            "message": "cannot read license plate",
            "data": {
                "license_plate": event.plate,
                "license_plate_img_base64": to_base64(upload.plate_image.as_ref()),
            },
        });
        state.publish(&room, &payload).await;
        return Ok((StatusCode::OK, UPLOAD_OK).into_response());
    }

    let target_zone = match direction {
        Direction::Entrance => zoning_code.clone(),
        Direction::Exit => query.next_zone.clone().unwrap_or_default(),
    };
    let request = json!({
        "license_plate": event.plate,
        "parking_code": state.parking_code(),
        "zoning_code": target_zone,
        "vehicle_type_id": vehicle_type_id(&event.vehicle_type),
        "gate_id": gate.as_str(),
    });

    let reply = state
        .cloud()
        .post_json(ZONING_TRANSITION_PATH, &request)
        .await
        .map_err(|e| {
            warn!(%room, plate = %event.plate, error = %e, "Zoning transition failed");
            ApiError::BadGateway("transition failed".to_string())
        })?;

    let success = reply.is_success();
    let uuid = reply.data_uuid().map(str::to_string);
    let payload = with_plate_image(reply.body, &upload);

    if success {
        match uuid {
            Some(uuid) => spawn_collect_image(&state, uuid, &zoning_code, &event, &upload),
            None => warn!(%room, plate = %event.plate, "Transition succeeded without uuid, skipping image upload"),
        }
    }

    state.publish(&room, &payload).await;

    state.update_sign(
        SignPanel::Zone,
        direction,
        &gate,
        &event.plate,
        SignMode::Zone,
        String::new(),
    );

    Ok((StatusCode::OK, UPLOAD_OK).into_response())
}

/// Make sure the reply carries a `data` object and put the plate crop in it
fn with_plate_image(body: Value, upload: &CameraUpload) -> Value {
    let mut root = match body {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    let data = root
        .entry("data")
        .or_insert_with(|| Value::Object(Map::new()));
    if data.is_null() {
        *data = Value::Object(Map::new());
    }
    if let Value::Object(data) = data {
        data.insert(
            "license_plate_img_base64".to_string(),
            Value::String(to_base64(upload.plate_image.as_ref())),
        );
    }

    Value::Object(root)
}

/// PUT the event pictures to the zone's collect-image endpoint.
///
/// Runs in the background; errors are logged only.
fn spawn_collect_image(
    state: &AppState,
    uuid: String,
    zoning_code: &str,
    event: &PlateEvent,
    upload: &CameraUpload,
) {
    let state = state.clone();
    let path = format!("{ZONING_COLLECT_IMAGE_PATH}/{uuid}");
    let body = json!({
        "license_plate": event.plate,
        "park_code": state.parking_code(),
        "zoning_code": zoning_code,
        "time_stamp": Local::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        // The collector only knows the entrance side.
        "gate": Direction::Entrance.short(),
        "license_plate_img_base64": to_base64(upload.plate_image.as_ref()),
        "driver_img_base_64": to_base64(upload.detection_image.as_ref()),
    });

    tokio::spawn(async move {
        if let Err(e) = state.cloud().put_json(&path, &body).await {
            warn!(%uuid, error = %e, "Zoning image upload failed");
        }
    });
}
