//! HTTP and WebSocket request handlers
//!
//! Response bodies follow the `{status, message, data}` envelope the gate
//! display clients already understand.

pub mod barrier;
pub mod health;
pub mod image;
pub mod order;
pub mod ws;
pub mod zoning;

use serde::{Deserialize, Serialize};

/// Envelope shared by the gateway's JSON replies
#[derive(Debug, Serialize)]
pub struct StatusResponse<T: Serialize> {
    pub status: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> StatusResponse<T> {
    pub fn ok(message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            status: true,
            message: message.into(),
            data,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: false,
            message: message.into(),
            data: None,
        }
    }
}

/// `?gate_no=` query shared by the camera webhooks
#[derive(Debug, Default, Deserialize)]
pub struct GateQuery {
    pub gate_no: Option<String>,
}
