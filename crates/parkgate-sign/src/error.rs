//! Sign encoding and transport errors

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignError {
    #[error("Plate record too long: {len} bytes (max 14)")]
    PlateTooLong { len: usize },

    #[error("Info record too long: {len} bytes (max 16)")]
    InfoTooLong { len: usize },

    #[error("Sign not configured: {0}")]
    NotConfigured(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}
