//! parkgate-field - Field-bus side of the gateway
//!
//! Barriers are driven by pulsing a coil on a Modbus-TCP controller. Two
//! trigger paths share one [`BarrierCommander`]:
//!
//! - the MQTT command bus ([`BusListener`] -> [`CommandDispatcher`])
//! - synchronous HTTP triggers in the API crate
//!
//! The session layer is behind [`FieldBusConnector`] so the actuation logic
//! can be exercised against [`RecordingConnector`] in tests.

pub mod actuator;
pub mod dispatcher;
pub mod error;
pub mod fieldbus;
pub mod listener;

pub use actuator::{Actuator, BarrierCommander};
pub use dispatcher::{parse_topic, subscription_filter, BarrierTopic, CommandDispatcher, DispatchError};
pub use error::FieldBusError;
pub use fieldbus::mock::{FieldEvent, RecordingConnector};
pub use fieldbus::modbus::ModbusTcpConnector;
pub use fieldbus::{CoilSession, FieldBusConnector};
pub use listener::{BusListener, BusListenerConfig};
