//! Application state for the gateway API

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parkgate_core::{CameraSet, DedupCache, DeviceDirectory, Direction, GateNo, SignPanel};
use parkgate_fetch::{pick_host, HedgedFetcher};
use parkgate_field::BarrierCommander;
use parkgate_hub::HubHandle;
use parkgate_sign::{SignContent, SignDisplay, SignMode};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::cloud::{CloudApi, SIGHTING_PATH};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    hub: HubHandle,
    barriers: BarrierCommander,
    fetcher: HedgedFetcher,
    signs: SignDisplay,
    cloud: Arc<dyn CloudApi>,
    dedup: Arc<DedupCache>,
    parking_code: Arc<str>,
}

impl AppState {
    pub fn new(
        hub: HubHandle,
        barriers: BarrierCommander,
        fetcher: HedgedFetcher,
        signs: SignDisplay,
        cloud: Arc<dyn CloudApi>,
        dedup: Arc<DedupCache>,
        parking_code: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            hub,
            barriers,
            fetcher,
            signs,
            cloud,
            dedup,
            parking_code: parking_code.into(),
        }
    }

    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    pub fn barriers(&self) -> &BarrierCommander {
        &self.barriers
    }

    pub fn directory(&self) -> &DeviceDirectory {
        self.barriers.directory()
    }

    pub fn fetcher(&self) -> &HedgedFetcher {
        &self.fetcher
    }

    pub fn cloud(&self) -> &dyn CloudApi {
        self.cloud.as_ref()
    }

    pub fn parking_code(&self) -> &str {
        &self.parking_code
    }

    /// True when `key` was already seen within the dedup window
    pub fn is_duplicate(&self, key: &str) -> bool {
        self.dedup.hit(key)
    }

    /// Broadcast a JSON payload to a room. Delivery is best-effort.
    pub async fn publish(&self, room: &str, payload: &Value) {
        if let Err(e) = self.hub.broadcast(room, payload.to_string()).await {
            warn!(%room, error = %e, "Broadcast dropped");
        }
    }

    /// Report a plate sighting to the cloud in the background.
    ///
    /// Errors are logged only.
    pub fn report_sighting(&self, plate: &str, ip_address: &str) {
        let cloud = self.cloud.clone();
        let body = json!({
            "license_plate": plate,
            "ip_address": ip_address,
            "parking_code": self.parking_code(),
        });
        tokio::spawn(async move {
            if let Err(e) = cloud.post_json(SIGHTING_PATH, &body).await {
                warn!(error = %e, "Sighting report failed");
            }
        });
    }

    /// Update the sign of a barrier in the background.
    ///
    /// A missing sign address or a failed send is logged only.
    pub fn update_sign(
        &self,
        panel: SignPanel,
        direction: Direction,
        gate: &GateNo,
        plate: &str,
        mode: SignMode,
        info_line: String,
    ) {
        let Some(host) = self.directory().resolve_sign(panel, direction, gate) else {
            warn!(
                key = %DeviceDirectory::sign_key(panel, direction, gate),
                "Sign address not configured"
            );
            return;
        };

        let signs = self.signs.clone();
        let plate = plate.to_string();
        tokio::spawn(async move {
            let content = SignContent::new(&plate, direction, mode).with_info(&info_line);
            match signs.show(Some(host.as_str()), content).await {
                Ok(()) => debug!(%plate, %direction, "Sign updated"),
                Err(e) => warn!(%plate, %direction, error = %e, "Sign update failed"),
            }
        });
    }

    /// Base64 snapshot from the preferred camera of `set`, if one answers
    pub async fn snapshot(
        &self,
        set: CameraSet,
        gate: &GateNo,
        prefs: &[&str],
        path: &str,
    ) -> Option<String> {
        let hosts = self.directory().camera_hosts(set, gate);
        let Some((role, host)) = pick_host(&hosts, prefs) else {
            warn!(?set, gate = %gate, "No camera configured");
            return None;
        };

        match self.fetcher.fetch_best(host, &[path]).await {
            Ok(image) => Some(STANDARD.encode(&image)),
            Err(e) => {
                warn!(%role, %host, error = %e, "Snapshot failed");
                None
            }
        }
    }
}
