//! Gateway configuration
//!
//! Configuration is read from an optional TOML file and then overridden by
//! the environment variables the field installations already use (`ADDR`,
//! `SERVER_URL`, `MODBUS_PORT`, ...). Overrides go through an
//! [`AddressSource`] so tests can supply them from a map.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::coils::CoilMap;
use crate::directory::AddressSource;
use crate::error::ConfigError;

/// Top-level daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cloud: CloudConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub modbus: ModbusConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub sign: SignConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub coils: CoilMap,
    /// Static device keys (`ENT_GATE_01 = "10.0.0.5"`), layered over the environment
    #[serde(default)]
    pub devices: BTreeMap<String, String>,
}

// =============================================================================
// Sections
// =============================================================================

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
    /// Upper bound on a single HTTP request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Remote order/payment API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default)]
    pub parking_code: String,
    #[serde(default = "default_cloud_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_server_url() -> String {
    "https://api-pms.jparkdev.co".to_string()
}

fn default_cloud_timeout_ms() -> u64 {
    6000
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            parking_code: String::new(),
            timeout_ms: default_cloud_timeout_ms(),
        }
    }
}

/// Camera snapshot access
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub pass: String,
    #[serde(default = "default_camera_scheme")]
    pub scheme: String,
    #[serde(default = "default_snapshot_timeout_ms")]
    pub timeout_ms: u64,
    /// Bodies at or below this size are camera placeholders, not snapshots
    #[serde(default = "default_min_useful_bytes")]
    pub min_useful_bytes: usize,
}

fn default_camera_scheme() -> String {
    "http".to_string()
}

fn default_snapshot_timeout_ms() -> u64 {
    10_000
}

fn default_min_useful_bytes() -> usize {
    800
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            pass: String::new(),
            scheme: default_camera_scheme(),
            timeout_ms: default_snapshot_timeout_ms(),
            min_useful_bytes: default_min_useful_bytes(),
        }
    }
}

/// Modbus-TCP barrier controllers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModbusConfig {
    #[serde(default = "default_modbus_port")]
    pub port: u16,
    #[serde(default = "default_modbus_timeout_ms")]
    pub timeout_ms: u64,
    /// Dwell between energize and de-energize for HTTP-triggered pulses
    #[serde(default = "default_modbus_pulse_ms")]
    pub pulse_ms: u64,
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,
}

fn default_modbus_port() -> u16 {
    504
}

fn default_modbus_timeout_ms() -> u64 {
    5000
}

fn default_modbus_pulse_ms() -> u64 {
    1000
}

fn default_unit_id() -> u8 {
    1
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            port: default_modbus_port(),
            timeout_ms: default_modbus_timeout_ms(),
            pulse_ms: default_modbus_pulse_ms(),
            unit_id: default_unit_id(),
        }
    }
}

/// MQTT command bus; the listener only runs when `host` is set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// Dwell for bus-triggered pulses
    #[serde(default = "default_mqtt_pulse_ms")]
    pub pulse_ms: u64,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_mqtt_pulse_ms() -> u64 {
    500
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_mqtt_port(),
            client_id: None,
            keep_alive_secs: default_keep_alive_secs(),
            pulse_ms: default_mqtt_pulse_ms(),
        }
    }
}

/// LED sign datagrams
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignConfig {
    #[serde(default = "default_sign_port")]
    pub port: u16,
    #[serde(default = "default_sign_timeout_ms")]
    pub send_timeout_ms: u64,
}

fn default_sign_port() -> u16 {
    9999
}

fn default_sign_timeout_ms() -> u64 {
    2000
}

impl Default for SignConfig {
    fn default() -> Self {
        Self {
            port: default_sign_port(),
            send_timeout_ms: default_sign_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    #[serde(default = "default_dedup_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_dedup_ttl_secs() -> u64 {
    30
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_dedup_ttl_secs(),
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

impl GatewayConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Apply environment-style overrides from `source`
    pub fn apply_overrides(&mut self, source: &dyn AddressSource) -> Result<(), ConfigError> {
        override_string(source, "ADDR", &mut self.server.addr);
        override_parsed(
            source,
            "REQUEST_TIMEOUT_SECS",
            &mut self.server.request_timeout_secs,
        )?;

        override_string(source, "SERVER_URL", &mut self.cloud.server_url);
        override_string(source, "PARKING_CODE", &mut self.cloud.parking_code);
        override_parsed(source, "CLOUD_TIMEOUT_MS", &mut self.cloud.timeout_ms)?;

        override_string(source, "CAMERA_USER", &mut self.camera.user);
        override_string(source, "CAMERA_PASS", &mut self.camera.pass);
        override_string(source, "SNAPSHOT_SCHEME", &mut self.camera.scheme);
        override_parsed(source, "SNAPSHOT_TIMEOUT_MS", &mut self.camera.timeout_ms)?;

        override_parsed(source, "MODBUS_PORT", &mut self.modbus.port)?;
        override_parsed(source, "MODBUS_TIMEOUT_MS", &mut self.modbus.timeout_ms)?;
        override_parsed(source, "MODBUS_PULSE_MS", &mut self.modbus.pulse_ms)?;
        override_parsed(source, "MODBUS_SLAVE_ID", &mut self.modbus.unit_id)?;

        if let Some(host) = non_blank(source, "MQTT_HOST") {
            self.mqtt.host = Some(host);
        }
        override_parsed(source, "MQTT_PORT", &mut self.mqtt.port)?;
        override_parsed(source, "MQTT_PULSE_MS", &mut self.mqtt.pulse_ms)?;

        override_parsed(source, "LED_PORT", &mut self.sign.port)?;
        override_parsed(source, "DEDUP_TTL_SECS", &mut self.dedup.ttl_secs)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.coils.validate()?;
        self.listen_addr()?;
        url::Url::parse(&self.cloud.server_url)
            .map_err(|e| ConfigError::invalid("cloud.server_url", e.to_string()))?;
        if self.modbus.timeout_ms == 0 {
            return Err(ConfigError::invalid("modbus.timeout_ms", "must be non-zero"));
        }
        if self.camera.timeout_ms == 0 {
            return Err(ConfigError::invalid("camera.timeout_ms", "must be non-zero"));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .addr
            .parse()
            .map_err(|e: std::net::AddrParseError| {
                ConfigError::invalid("server.addr", e.to_string())
            })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn cloud_timeout(&self) -> Duration {
        Duration::from_millis(self.cloud.timeout_ms)
    }

    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_millis(self.camera.timeout_ms)
    }

    pub fn modbus_timeout(&self) -> Duration {
        Duration::from_millis(self.modbus.timeout_ms)
    }

    pub fn http_pulse(&self) -> Duration {
        Duration::from_millis(self.modbus.pulse_ms)
    }

    pub fn bus_pulse(&self) -> Duration {
        Duration::from_millis(self.mqtt.pulse_ms)
    }

    pub fn sign_timeout(&self) -> Duration {
        Duration::from_millis(self.sign.send_timeout_ms)
    }

    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.dedup.ttl_secs)
    }
}

fn non_blank(source: &dyn AddressSource, key: &str) -> Option<String> {
    source
        .lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn override_string(source: &dyn AddressSource, key: &str, target: &mut String) {
    if let Some(value) = non_blank(source, key) {
        *target = value;
    }
}

fn override_parsed<T>(source: &dyn AddressSource, key: &str, target: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(value) = non_blank(source, key) {
        *target = value
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(key, e.to_string()))?;
    }
    Ok(())
}
