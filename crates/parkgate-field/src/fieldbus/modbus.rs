//! Minimal Modbus-TCP client: function 0x05 (Write Single Coil) only
//!
//! ADU layout:
//!
//! ```text
//! MBAP  transaction id (2) | protocol id = 0 (2) | length (2) | unit id (1)
//! PDU   function 0x05 (1) | coil address (2) | value 0xFF00 / 0x0000 (2)
//! ```
//!
//! A successful response echoes the request. Exception responses carry the
//! function code with the high bit set followed by one exception code.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use super::{CoilSession, FieldBusConnector};
use crate::error::FieldBusError;

pub const WRITE_SINGLE_COIL: u8 = 0x05;
pub const COIL_ON: u16 = 0xFF00;
pub const COIL_OFF: u16 = 0x0000;

const MBAP_LEN: usize = 7;
const EXCEPTION_FLAG: u8 = 0x80;

/// Build a Write Single Coil request ADU
pub fn encode_write_single_coil(transaction: u16, unit_id: u8, address: u16, on: bool) -> [u8; 12] {
    let value = if on { COIL_ON } else { COIL_OFF };
    let [t_hi, t_lo] = transaction.to_be_bytes();
    let [a_hi, a_lo] = address.to_be_bytes();
    let [v_hi, v_lo] = value.to_be_bytes();
    [
        t_hi, t_lo, 0x00, 0x00, 0x00, 0x06, unit_id, WRITE_SINGLE_COIL, a_hi, a_lo, v_hi, v_lo,
    ]
}

/// Validate a response ADU against the request it answers
pub fn check_write_single_coil_response(request: &[u8; 12], response: &[u8]) -> Result<(), FieldBusError> {
    if response.len() < MBAP_LEN + 2 {
        return Err(FieldBusError::ProtocolError(format!(
            "response too short: {} bytes",
            response.len()
        )));
    }
    if response[0..2] != request[0..2] {
        return Err(FieldBusError::ProtocolError(format!(
            "transaction mismatch: sent {}, got {}",
            hex::encode(&request[0..2]),
            hex::encode(&response[0..2])
        )));
    }
    if response[2..4] != [0x00, 0x00] {
        return Err(FieldBusError::ProtocolError("non-Modbus protocol id".to_string()));
    }

    let function = response[MBAP_LEN];
    if function == WRITE_SINGLE_COIL | EXCEPTION_FLAG {
        return Err(FieldBusError::Exception {
            function: WRITE_SINGLE_COIL,
            code: response[MBAP_LEN + 1],
        });
    }
    if function != WRITE_SINGLE_COIL {
        return Err(FieldBusError::ProtocolError(format!(
            "unexpected function 0x{function:02X}"
        )));
    }
    if response.len() != request.len() || response[MBAP_LEN..] != request[MBAP_LEN..] {
        return Err(FieldBusError::ProtocolError(format!(
            "response does not echo request: {}",
            hex::encode(response)
        )));
    }
    Ok(())
}

/// Connects to controllers on a fixed port
#[derive(Debug, Clone)]
pub struct ModbusTcpConnector {
    port: u16,
    timeout: Duration,
    unit_id: u8,
}

impl ModbusTcpConnector {
    pub fn new(port: u16, timeout: Duration, unit_id: u8) -> Self {
        Self {
            port,
            timeout,
            unit_id,
        }
    }
}

#[async_trait]
impl FieldBusConnector for ModbusTcpConnector {
    async fn connect(&self, host: &str) -> Result<Box<dyn CoilSession>, FieldBusError> {
        let peer = format!("{}:{}", host, self.port);
        debug!(%peer, "Connecting to Modbus controller");

        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(&peer))
            .await
            .map_err(|_| FieldBusError::Timeout(format!("connect {peer}")))?
            .map_err(|e| FieldBusError::ConnectionFailed(format!("{peer}: {e}")))?;
        let _ = stream.set_nodelay(true);

        Ok(Box::new(ModbusTcpSession {
            stream: Some(stream),
            peer,
            unit_id: self.unit_id,
            timeout: self.timeout,
            transaction: 0,
        }))
    }
}

struct ModbusTcpSession {
    stream: Option<TcpStream>,
    peer: String,
    unit_id: u8,
    timeout: Duration,
    transaction: u16,
}

impl ModbusTcpSession {
    async fn exchange(stream: &mut TcpStream, request: &[u8; 12]) -> Result<Vec<u8>, FieldBusError> {
        stream
            .write_all(request)
            .await
            .map_err(|e| FieldBusError::Io(e.to_string()))?;

        let mut header = [0u8; MBAP_LEN];
        stream
            .read_exact(&mut header)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => FieldBusError::ConnectionClosed,
                _ => FieldBusError::Io(e.to_string()),
            })?;

        let length = u16::from_be_bytes([header[4], header[5]]) as usize;
        if !(2..=254).contains(&length) {
            return Err(FieldBusError::ProtocolError(format!(
                "invalid MBAP length {length}"
            )));
        }

        let mut response = header.to_vec();
        response.resize(MBAP_LEN + length - 1, 0);
        stream
            .read_exact(&mut response[MBAP_LEN..])
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => FieldBusError::ConnectionClosed,
                _ => FieldBusError::Io(e.to_string()),
            })?;
        Ok(response)
    }
}

#[async_trait]
impl CoilSession for ModbusTcpSession {
    async fn write_single_coil(&mut self, address: u16, on: bool) -> Result<(), FieldBusError> {
        let stream = self.stream.as_mut().ok_or(FieldBusError::ConnectionClosed)?;

        self.transaction = self.transaction.wrapping_add(1);
        let request = encode_write_single_coil(self.transaction, self.unit_id, address, on);
        trace!(peer = %self.peer, request = %hex::encode(request), "Modbus request");

        let response = tokio::time::timeout(self.timeout, Self::exchange(stream, &request))
            .await
            .map_err(|_| FieldBusError::Timeout(format!("write coil {address} on {}", self.peer)))??;
        trace!(peer = %self.peer, response = %hex::encode(&response), "Modbus response");

        check_write_single_coil_response(&request, &response)
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
            debug!(peer = %self.peer, "Modbus session closed");
        }
    }
}
