//! Subscriber seam between the hub and a concrete socket

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriberError {
    #[error("Peer closed")]
    Closed,

    #[error("Write failed: {0}")]
    WriteFailed(String),
}

/// Write half of one live connection.
///
/// Once registered, the hub is the only caller of these methods.
#[async_trait]
pub trait Subscriber: Send + 'static {
    /// Send one text frame
    async fn send_text(&mut self, text: &str) -> Result<(), SubscriberError>;

    /// Close the underlying transport; called exactly once by the hub
    async fn close(&mut self);
}
