//! Camera event uploads
//!
//! ANPR cameras push each detection as a multipart upload: an ISAPI
//! `EventNotificationAlert` XML document plus optional JPEG attachments.

use std::time::Duration;

use axum::extract::multipart::MultipartRejection;
use axum::extract::Multipart;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use tracing::debug;

use crate::error::ApiError;

/// Upper bound on parts per upload
pub const MAX_PARTS: usize = 10;

/// Upper bound on the whole request body
pub const MAX_UPLOAD_BYTES: usize = 16 << 20;

const READ_TIMEOUT: Duration = Duration::from_secs(15);

const PLATE_PICTURE: &str = "licensePlatePicture.jpg";
const DETECTION_PICTURES: [&str; 2] = ["detectedImage.jpg", "pedestrianDetectionPicture.jpg"];

/// Files extracted from one upload
#[derive(Debug, Default, Clone)]
pub struct CameraUpload {
    pub xml: Bytes,
    pub plate_image: Option<Bytes>,
    pub detection_image: Option<Bytes>,
}

impl CameraUpload {
    /// Plate crop, falling back to the wide detection picture
    pub fn plate_or_detection(&self) -> Option<&Bytes> {
        self.plate_image.as_ref().or(self.detection_image.as_ref())
    }
}

/// Read a camera upload. Images are dropped unless `keep_images` is set.
pub async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
    keep_images: bool,
) -> Result<CameraUpload, ApiError> {
    let multipart = multipart.map_err(|rejection| {
        debug!(%rejection, "Rejected camera upload");
        ApiError::BadRequest("Invalid request".to_string())
    })?;

    let upload = tokio::time::timeout(READ_TIMEOUT, collect_parts(multipart, keep_images))
        .await
        .map_err(|_| ApiError::RequestTimeout("multipart read timeout".to_string()))??;

    if upload.xml.is_empty() {
        return Err(ApiError::BadRequest("Missing XML file".to_string()));
    }
    Ok(upload)
}

async fn collect_parts(mut multipart: Multipart, keep_images: bool) -> Result<CameraUpload, ApiError> {
    let mut upload = CameraUpload::default();
    let mut parts = 0;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("invalid multipart".to_string()))?
    {
        parts += 1;
        if parts > MAX_PARTS {
            return Err(ApiError::BadRequest("too many parts".to_string()));
        }

        // Plain form fields carry nothing we use.
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        let is_xml = file_name.to_ascii_lowercase().ends_with(".xml");
        let is_plate = file_name == PLATE_PICTURE;
        let is_detection = DETECTION_PICTURES.contains(&file_name.as_str());
        if !is_xml && !(keep_images && (is_plate || is_detection)) {
            continue;
        }

        let data = field
            .bytes()
            .await
            .map_err(|_| ApiError::BadRequest("invalid multipart".to_string()))?;
        debug!(%file_name, bytes = data.len(), "Upload part");

        if is_xml {
            upload.xml = data;
        } else if is_plate {
            upload.plate_image = Some(data);
        } else {
            upload.detection_image = Some(data);
        }
    }

    Ok(upload)
}

// =============================================================================
// Event XML
// =============================================================================

/// Fields of an ANPR event notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlateEvent {
    pub plate: String,
    pub uuid: String,
    pub date_time: String,
    pub ip_address: String,
    pub vehicle_type: String,
}

impl PlateEvent {
    /// Parse an event document; `None` when it carries no plate
    pub fn parse(xml: &[u8]) -> Option<Self> {
        let xml = String::from_utf8_lossy(xml);
        let field = |tag: &str| extract_xml_value(&xml, tag).unwrap_or_default();

        let plate = extract_xml_value(&xml, "licensePlate")?;
        Some(Self {
            plate,
            uuid: field("UUID"),
            date_time: field("dateTime"),
            ip_address: field("ipAddress"),
            vehicle_type: field("vehicleType"),
        })
    }

    /// Whether the camera saw a vehicle but could not read its plate
    pub fn is_unreadable(&self) -> bool {
        self.plate.eq_ignore_ascii_case("unknown")
    }
}

/// Trimmed text of the first non-empty `tag` element, with or without a
/// namespace prefix
pub fn extract_xml_value(xml: &str, tag: &str) -> Option<String> {
    let mut from = 0;
    while let Some(offset) = xml[from..].find('<') {
        let open = from + offset;
        from = open + 1;

        let rest = &xml[open + 1..];
        let head_len = rest.find('>')?;
        let head = &rest[..head_len];
        if head.starts_with(|c: char| matches!(c, '/' | '?' | '!')) || head.ends_with('/') {
            continue;
        }

        let name = head.split_whitespace().next().unwrap_or_default();
        let local = name.rsplit(':').next().unwrap_or(name);
        if local != tag {
            continue;
        }

        let content_start = open + 1 + head_len + 1;
        let content_len = xml[content_start..].find("</")?;
        let value = xml[content_start..content_start + content_len].trim();
        if !value.is_empty() {
            return Some(unescape(value));
        }
    }
    None
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

pub fn to_base64(data: Option<&Bytes>) -> String {
    data.map(|bytes| STANDARD.encode(bytes)).unwrap_or_default()
}
