//! Field-bus session abstraction

pub mod mock;
pub mod modbus;

use async_trait::async_trait;

use crate::error::FieldBusError;

/// Opens coil sessions to barrier controllers
#[async_trait]
pub trait FieldBusConnector: Send + Sync {
    async fn connect(&self, host: &str) -> Result<Box<dyn CoilSession>, FieldBusError>;
}

/// One open session to a controller
#[async_trait]
pub trait CoilSession: Send {
    /// Write a single coil: `true` energizes, `false` de-energizes
    async fn write_single_coil(&mut self, address: u16, on: bool) -> Result<(), FieldBusError>;

    async fn close(&mut self);
}
