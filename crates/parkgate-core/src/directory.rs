//! Device directory
//!
//! Field devices (barrier controllers, LED signs, cameras) are addressed by
//! static keys such as `ENT_GATE_01` or `HIK_LED_MAIN_EXT_02`. The keys are
//! looked up at call time through an [`AddressSource`], so the same
//! directory can be backed by the process environment, a config table, or a
//! plain map in tests. An absent or blank entry means "not configured".

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::models::{BarrierClass, Direction, GateNo};

/// A read-only key/value source for device addresses
pub trait AddressSource: Send + Sync {
    fn lookup(&self, key: &str) -> Option<String>;
}

/// Reads keys from the process environment
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSource;

impl AddressSource for EnvSource {
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl AddressSource for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl AddressSource for BTreeMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Stack of sources; the first non-blank value wins
#[derive(Clone, Default)]
pub struct LayeredSource {
    layers: Vec<Arc<dyn AddressSource>>,
}

impl LayeredSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layer(mut self, layer: Arc<dyn AddressSource>) -> Self {
        self.layers.push(layer);
        self
    }
}

impl AddressSource for LayeredSource {
    fn lookup(&self, key: &str) -> Option<String> {
        self.layers
            .iter()
            .filter_map(|layer| layer.lookup(key))
            .find(|value| !value.trim().is_empty())
    }
}

/// Which LED sign panel to address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignPanel {
    /// Panel at the main facility gate
    Main,
    /// Panel at a zoning barrier
    Zone,
}

impl SignPanel {
    fn code(self) -> &'static str {
        match self {
            SignPanel::Main => "MAIN",
            SignPanel::Zone => "ZONE",
        }
    }
}

/// Named groups of camera roles configured per gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraSet {
    /// Every exit camera (`lpr_out`, `license_plate_out`, `driver_out`)
    ExitAll,
    /// Exit LPR camera only
    ExitLpr,
    /// Exit license-plate camera only
    ExitLicensePlate,
    /// Entrance driver camera
    EntranceDriver,
    /// Entrance license-plate camera
    EntranceLicensePlate,
}

impl CameraSet {
    /// `(role, key prefix)` pairs for this set
    pub fn roles(self) -> &'static [(&'static str, &'static str)] {
        match self {
            CameraSet::ExitAll => &[
                ("lpr_out", "LPR_OUT_"),
                ("license_plate_out", "LIC_OUT_"),
                ("driver_out", "DRI_OUT_"),
            ],
            CameraSet::ExitLpr => &[("lpr_out", "LPR_OUT_")],
            CameraSet::ExitLicensePlate => &[("license_plate_out", "LIC_OUT_")],
            CameraSet::EntranceDriver => &[("driver_in", "DRI_IN_")],
            CameraSet::EntranceLicensePlate => &[("lic_in", "LIC_IN_")],
        }
    }
}

/// Resolves device addresses from directory keys
#[derive(Clone)]
pub struct DeviceDirectory {
    source: Arc<dyn AddressSource>,
}

impl DeviceDirectory {
    pub fn new(source: Arc<dyn AddressSource>) -> Self {
        Self { source }
    }

    /// Trimmed, non-blank value for `key`
    pub fn get(&self, key: &str) -> Option<String> {
        self.source
            .lookup(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    /// Key of a barrier controller, e.g. `ENT_GATE_01`
    pub fn barrier_key(direction: Direction, class: BarrierClass, gate: &str) -> String {
        format!("{}_{}_{}", direction.code(), class.code(), gate)
    }

    /// Resolve a barrier controller address.
    ///
    /// The gate is tried as supplied first, then in its padded form.
    pub fn resolve_barrier(
        &self,
        direction: Direction,
        class: BarrierClass,
        gate: &GateNo,
    ) -> Option<String> {
        let raw = Self::barrier_key(direction, class, gate.as_str());
        let found = self.get(&raw).or_else(|| {
            let padded = gate.padded();
            if padded == gate.as_str() {
                None
            } else {
                self.get(&Self::barrier_key(direction, class, &padded))
            }
        });
        if found.is_none() {
            tracing::debug!(key = %raw, "No barrier controller configured");
        }
        found
    }

    /// Key of an LED sign, e.g. `HIK_LED_MAIN_ENT_01`
    pub fn sign_key(panel: SignPanel, direction: Direction, gate: &GateNo) -> String {
        format!(
            "HIK_LED_{}_{}_{}",
            panel.code(),
            direction.code(),
            gate.padded()
        )
    }

    pub fn resolve_sign(
        &self,
        panel: SignPanel,
        direction: Direction,
        gate: &GateNo,
    ) -> Option<String> {
        self.get(&Self::sign_key(panel, direction, gate))
    }

    /// Configured camera hosts of `set` for `gate`, keyed by role.
    ///
    /// Roles without a configured host are left out.
    pub fn camera_hosts(&self, set: CameraSet, gate: &GateNo) -> BTreeMap<String, String> {
        let padded = gate.padded();
        set.roles()
            .iter()
            .filter_map(|(role, prefix)| {
                self.get(&format!("{prefix}{padded}"))
                    .map(|host| (role.to_string(), host))
            })
            .collect()
    }
}

impl std::fmt::Debug for DeviceDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceDirectory").finish_non_exhaustive()
    }
}
