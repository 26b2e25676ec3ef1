//! Entrance and exit camera webhooks
//!
//! A camera posts one multipart upload per plate read. The gateway answers
//! the camera quickly and fans the result out to the gate display, the LED
//! sign and, on exit, the barrier.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{Local, SecondsFormat};
use parkgate_core::{
    vehicle_type_id, BarrierAction, BarrierClass, CameraSet, Direction, GateNo, SignPanel,
};
use parkgate_fetch::{PLATE_HOST_PREFS, PLATE_SNAPSHOT_PATH};
use parkgate_sign::SignMode;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::cloud::{COLLECT_IMAGE_PATH, CUSTOMER_LOOKUP_PATH, EXIT_CHECK_PATH};
use crate::error::ApiError;
use crate::event::{read_upload, to_base64, PlateEvent};
use crate::handlers::GateQuery;
use crate::state::AppState;

pub(crate) const UPLOAD_OK: &str = "File(s) uploaded successfully";
pub(crate) const DUPLICATE_IGNORED: &str = "Duplicate event ignored";

pub(crate) fn gate_from_query(gate_no: Option<&str>) -> Result<GateNo, ApiError> {
    gate_no
        .and_then(|raw| GateNo::parse(raw).ok())
        .ok_or_else(|| ApiError::BadRequest("invalid gate_no".to_string()))
}

pub(crate) fn parse_event(xml: &[u8]) -> Result<PlateEvent, ApiError> {
    PlateEvent::parse(xml).ok_or_else(|| ApiError::BadRequest("Failed to parse XML".to_string()))
}

/// POST /api/v2-202402/order/verify-member?gate_no=N
pub async fn verify_member(
    State(state): State<AppState>,
    Query(query): Query<GateQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let gate = gate_from_query(query.gate_no.as_deref())?;
    let upload = read_upload(multipart, true).await?;
    let event = parse_event(&upload.xml)?;

    let room = format!("gate_in_{gate}");
    if state.is_duplicate(&format!("{room}|{}", event.plate)) {
        debug!(%room, plate = %event.plate, "Duplicate entrance event");
        return Ok((StatusCode::OK, DUPLICATE_IGNORED).into_response());
    }
    info!(gate = %gate, plate = %event.plate, "Entrance event");

    state.report_sighting(&event.plate, &event.ip_address);

    let (cust_id, ef_id) = match state
        .cloud()
        .get_json(
            CUSTOMER_LOOKUP_PATH,
            &[
                ("license_plate", event.plate.as_str()),
                ("parking_code", state.parking_code()),
            ],
        )
        .await
    {
        Ok(reply) => (
            reply.body.get("cust_id").cloned().unwrap_or(Value::Null),
            reply.body.get("ef_id").cloned().unwrap_or(Value::Null),
        ),
        Err(e) => {
            warn!(plate = %event.plate, error = %e, "Customer lookup failed");
            (Value::Null, Value::Null)
        }
    };

    state.update_sign(
        SignPanel::Main,
        Direction::Entrance,
        &gate,
        &event.plate,
        SignMode::Main,
        String::new(),
    );

    let payload = json!({
        "license_plate": event.plate,
        "uuid": event.uuid,
        "time_in": event.date_time,
        "cust_id": cust_id,
        "ef_id": ef_id,
        "vehicle_type": vehicle_type_id(&event.vehicle_type),
        "license_plate_img_base64": to_base64(upload.plate_or_detection()),
    });
    state.publish(&room, &payload).await;

    Ok((StatusCode::OK, UPLOAD_OK).into_response())
}

/// POST /api/v2-202402/order/verify-license-plate-out?gate_no=N
pub async fn verify_license_plate_out(
    State(state): State<AppState>,
    Query(query): Query<GateQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let gate = gate_from_query(query.gate_no.as_deref())?;
    let upload = read_upload(multipart, false).await?;
    let event = parse_event(&upload.xml)?;

    let room = format!("gate_out_{gate}");
    if state.is_duplicate(&format!("{room}|{}", event.plate)) {
        debug!(%room, plate = %event.plate, "Duplicate exit event");
        return Ok((StatusCode::OK, DUPLICATE_IGNORED).into_response());
    }
    info!(gate = %gate, plate = %event.plate, "Exit event");

    state.report_sighting(&event.plate, &event.ip_address);

    let reply = state
        .cloud()
        .get_json(
            EXIT_CHECK_PATH,
            &[
                ("license_plate", event.plate.as_str()),
                ("parking_code", state.parking_code()),
            ],
        )
        .await
        .map_err(|e| warn!(plate = %event.plate, error = %e, "Exit check failed"))
        .ok();

    let status = reply.as_ref().and_then(|r| r.status_flag());

    if status == Some(true) {
        match state
            .barriers()
            .actuate(Direction::Exit, BarrierClass::Gate, &gate, BarrierAction::Open)
            .await
        {
            Ok(()) => {
                if let Some(uuid) = reply.as_ref().and_then(|r| r.data_uuid()) {
                    spawn_exit_image_upload(&state, uuid, &event.plate, &gate);
                }
            }
            Err(e) => warn!(gate = %gate, plate = %event.plate, error = %e, "Exit barrier did not open"),
        }
    }

    let to_pay = match (&reply, status) {
        (Some(reply), Some(false)) => reply
            .data()
            .and_then(|data| data.get("to_pay_amount"))
            .map(format_amount)
            .unwrap_or_default(),
        _ => String::new(),
    };

    if status == Some(true) && reply.as_ref().and_then(|r| r.message()) == Some("valet user") {
        info!(plate = %event.plate, "Valet user exit");
        return Ok(StatusCode::OK.into_response());
    }

    let hosts = state.directory().camera_hosts(CameraSet::ExitAll, &gate);
    let images = state
        .fetcher()
        .fetch_roles(&hosts, &[PLATE_SNAPSHOT_PATH])
        .await;

    let mut payload = match reply.map(|r| r.body) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    for (role, image) in images {
        payload.insert(role, Value::String(STANDARD.encode(&image)));
    }
    state.publish(&room, &Value::Object(payload)).await;

    let info_line = if to_pay.is_empty() {
        String::new()
    } else {
        format!("{to_pay} THB")
    };
    state.update_sign(
        SignPanel::Main,
        Direction::Exit,
        &gate,
        &event.plate,
        SignMode::Main,
        info_line,
    );

    Ok((StatusCode::OK, UPLOAD_OK).into_response())
}

/// Render an amount the way the sign shows it: strings verbatim, numbers
/// without decimals
fn format_amount(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) if n.is_i64() || n.is_u64() => n.to_string(),
        Value::Number(n) => n.as_f64().map(|f| format!("{f:.0}")).unwrap_or_default(),
        _ => String::new(),
    }
}

/// Upload the exit camera pictures for a completed exit.
///
/// Runs in the background; errors are logged only.
fn spawn_exit_image_upload(state: &AppState, uuid: &str, plate: &str, gate: &GateNo) {
    let state = state.clone();
    let uuid = uuid.to_string();
    let plate = plate.to_string();
    let gate = gate.clone();

    tokio::spawn(async move {
        let (lpr, license_plate) = tokio::join!(
            state.snapshot(CameraSet::ExitLpr, &gate, PLATE_HOST_PREFS, PLATE_SNAPSHOT_PATH),
            state.snapshot(
                CameraSet::ExitLicensePlate,
                &gate,
                PLATE_HOST_PREFS,
                PLATE_SNAPSHOT_PATH
            ),
        );

        let body = json!({
            "uuid": uuid,
            "license_plate": plate,
            "park_code": state.parking_code(),
            "time_stamp": Local::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            "gate": Direction::Exit.short(),
            "driver_img_base_64": lpr.unwrap_or_default(),
            "license_plate_img_base64": license_plate.unwrap_or_default(),
        });

        match state.cloud().post_json(COLLECT_IMAGE_PATH, &body).await {
            Ok(_) => info!(%plate, %uuid, "Exit images uploaded"),
            Err(e) => warn!(%plate, %uuid, error = %e, "Exit image upload failed"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(json!("120"), "120")]
    #[case(json!(45), "45")]
    #[case(json!(99.6), "100")]
    #[case(json!(null), "")]
    #[case(json!(true), "")]
    fn test_format_amount(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(format_amount(&value), expected);
    }

    #[test]
    fn test_gate_query_validation() {
        assert_eq!(gate_from_query(Some("01")).unwrap().as_str(), "01");

        for bad in [None, Some(""), Some("1a")] {
            assert!(matches!(gate_from_query(bad), Err(ApiError::BadRequest(_))));
        }
    }
}
