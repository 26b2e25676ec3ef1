//! Common error types for gateway commands and configuration

use thiserror::Error;

/// Errors raised while turning a barrier command into field-bus actuation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// No device address is configured for the requested barrier
    #[error("Device not configured: {key}")]
    NotConfigured {
        /// Directory key that was looked up (padded form)
        key: String,
    },

    /// Direction, gate or action failed validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The field-bus session or one of the coil writes failed
    #[error("Actuation failed: {0}")]
    Actuation(String),
}

/// Errors raised while loading or validating the daemon configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}
