//! Shared fixtures for the router tests
//!
//! Every outside system is replaced by an in-memory double: a recording
//! field-bus connector, a scripted camera, a recording sign sink, a scripted
//! cloud and channel-backed hub subscribers.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

use parkgate_api::{create_router, AppState, CloudApi, CloudError, CloudReply};
use parkgate_core::{AddressSource, CoilMap, DedupCache, DeviceDirectory};
use parkgate_fetch::{HedgedFetcher, ScriptedSnapshotClient};
use parkgate_field::{Actuator, BarrierCommander, RecordingConnector};
use parkgate_hub::{Hub, HubConfig, HubHandle, Subscriber, SubscriberError};
use parkgate_sign::{SignDisplay, SignError, SignSink};

pub const PARKING_CODE: &str = "PK01";
pub const BOUNDARY: &str = "----parkgate-test-boundary";

// =============================================================================
// Cloud double
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CloudCall {
    pub method: &'static str,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Value,
}

/// In-memory cloud: scripted replies per path, every call recorded
#[derive(Default)]
pub struct RecordingCloud {
    replies: RwLock<HashMap<String, Result<CloudReply, CloudError>>>,
    calls: RwLock<Vec<CloudCall>>,
}

impl RecordingCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, path: &str, body: Value) {
        self.replies
            .write()
            .insert(path.to_string(), Ok(CloudReply::ok(body)));
    }

    pub fn fail(&self, path: &str, error: CloudError) {
        self.replies.write().insert(path.to_string(), Err(error));
    }

    pub fn calls(&self) -> Vec<CloudCall> {
        self.calls.read().clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<CloudCall> {
        self.calls
            .read()
            .iter()
            .filter(|call| call.path == path)
            .cloned()
            .collect()
    }

    fn answer(
        &self,
        method: &'static str,
        path: &str,
        query: &[(&str, &str)],
        body: &Value,
    ) -> Result<CloudReply, CloudError> {
        self.calls.write().push(CloudCall {
            method,
            path: path.to_string(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.clone(),
        });
        self.replies
            .read()
            .get(path)
            .cloned()
            .unwrap_or_else(|| Ok(CloudReply::ok(json!({}))))
    }
}

#[async_trait]
impl CloudApi for RecordingCloud {
    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<CloudReply, CloudError> {
        self.answer("GET", path, query, &Value::Null)
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<CloudReply, CloudError> {
        self.answer("POST", path, &[], body)
    }

    async fn put_json(&self, path: &str, body: &Value) -> Result<CloudReply, CloudError> {
        self.answer("PUT", path, &[], body)
    }
}

// =============================================================================
// Sign and hub doubles
// =============================================================================

/// Sign sink that keeps every frame
#[derive(Default)]
pub struct RecordingSignSink {
    frames: RwLock<Vec<(String, u16, Vec<u8>)>>,
}

impl RecordingSignSink {
    pub fn frames(&self) -> Vec<(String, u16, Vec<u8>)> {
        self.frames.read().clone()
    }
}

#[async_trait]
impl SignSink for RecordingSignSink {
    async fn send_frame(&self, host: &str, port: u16, frame: &[u8]) -> Result<(), SignError> {
        self.frames
            .write()
            .push((host.to_string(), port, frame.to_vec()));
        Ok(())
    }
}

/// Hub subscriber forwarding every text frame into a channel
pub struct ChannelSubscriber {
    tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl Subscriber for ChannelSubscriber {
    async fn send_text(&mut self, text: &str) -> Result<(), SubscriberError> {
        self.tx
            .send(text.to_string())
            .map_err(|_| SubscriberError::Closed)
    }

    async fn close(&mut self) {}
}

// =============================================================================
// Gateway under test
// =============================================================================

pub struct TestGateway {
    pub router: Router,
    pub hub: HubHandle,
    pub connector: RecordingConnector,
    pub cameras: Arc<ScriptedSnapshotClient>,
    pub signs: Arc<RecordingSignSink>,
    pub cloud: Arc<RecordingCloud>,
}

impl TestGateway {
    pub fn new(devices: &[(&str, &str)]) -> Self {
        Self::with_cameras(devices, ScriptedSnapshotClient::new())
    }

    pub fn with_cameras(devices: &[(&str, &str)], cameras: ScriptedSnapshotClient) -> Self {
        let map: BTreeMap<String, String> = devices
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let source: Arc<dyn AddressSource> = Arc::new(map);
        let directory = DeviceDirectory::new(source);

        let (hub, _join) = Hub::spawn(HubConfig::default());

        let connector = RecordingConnector::new();
        let actuator = Arc::new(Actuator::new(
            Arc::new(connector.clone()),
            Duration::from_millis(5),
        ));
        let barriers = BarrierCommander::new(actuator, directory, Arc::new(CoilMap::default()));

        let cameras = Arc::new(cameras);
        let fetcher = HedgedFetcher::new(cameras.clone(), 800, Duration::from_secs(2));

        let signs = Arc::new(RecordingSignSink::default());
        let display = SignDisplay::new(signs.clone(), 9999);

        let cloud = Arc::new(RecordingCloud::new());

        let state = AppState::new(
            hub.clone(),
            barriers,
            fetcher,
            display,
            cloud.clone(),
            Arc::new(DedupCache::new(Duration::from_secs(30))),
            PARKING_CODE,
        );

        Self {
            router: create_router(state),
            hub,
            connector,
            cameras,
            signs,
            cloud,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Join `room` and return the receiving end of its broadcasts
    pub async fn listen(&self, room: &str) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.hub
            .register(room, Box::new(ChannelSubscriber { tx }))
            .await
            .unwrap();
        rx
    }
}

// =============================================================================
// Requests and responses
// =============================================================================

/// ISAPI alert carrying `plate`
pub fn alert_xml(plate: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<EventNotificationAlert version="2.0" xmlns="http://www.isapi.org/ver20/XMLSchema">
<ipAddress>192.168.1.64</ipAddress>
<dateTime>2024-05-01T08:15:30+07:00</dateTime>
<UUID>evt-0001</UUID>
<ANPR><licensePlate>{plate}</licensePlate><vehicleType>car</vehicleType></ANPR>
</EventNotificationAlert>"#
    )
}

/// Multipart body with one file part per `(file name, content)`
pub fn multipart_body(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, content) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload(uri: &str, files: &[(&str, &[u8])]) -> Request<Body> {
    Request::post(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(files)))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

pub async fn expect_status(response: Response<Body>, status: StatusCode) -> String {
    let actual = response.status();
    let text = body_text(response).await;
    assert_eq!(actual, status, "unexpected status, body: {text}");
    text
}

/// Wait until `check` holds, polling for up to a second
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
