//! Field-bus errors

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldBusError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Modbus exception 0x{code:02X} for function 0x{function:02X}")]
    Exception { function: u8, code: u8 },

    #[error("Protocol error: {0}")]
    ProtocolError(String),
}
