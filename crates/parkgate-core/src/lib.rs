//! parkgate-core - Core types shared by every parkgate crate
//!
//! This crate holds the domain vocabulary of the gateway (directions, barrier
//! classes, gate numbers), the coil assignment table, the device directory
//! used to resolve field devices from configuration keys, the deduplication
//! cache that guards inbound camera events, and the daemon configuration.

pub mod coils;
pub mod config;
pub mod dedup;
pub mod directory;
pub mod error;
pub mod models;

pub use coils::{CoilMap, CoilPair, DirectionCoils};
pub use config::GatewayConfig;
pub use dedup::DedupCache;
pub use directory::{
    AddressSource, CameraSet, DeviceDirectory, EnvSource, LayeredSource, SignPanel,
};
pub use error::{CommandError, ConfigError};
pub use models::{vehicle_type_id, BarrierAction, BarrierClass, Direction, GateNo};
