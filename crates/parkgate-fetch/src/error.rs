//! Snapshot fetch errors

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("No candidate paths")]
    NoCandidates,

    #[error("Camera returned status {0}")]
    Status(u16),

    #[error("Snapshot too small: {len} bytes (need more than {min})")]
    TooSmall { len: usize, min: usize },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Digest authentication failed: {0}")]
    Auth(String),

    #[error("Snapshot fetch timed out")]
    Timeout,

    #[error("Cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}
