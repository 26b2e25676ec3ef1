//! Single snapshot requests

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parkgate_core::config::CameraConfig;
use reqwest::header::{ACCEPT, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::FetchError;

/// Status and body of one completed request
#[derive(Debug, Clone)]
pub struct RawSnapshot {
    pub status: u16,
    pub body: Bytes,
}

/// Performs one snapshot GET against a camera
#[async_trait]
pub trait SnapshotClient: Send + Sync {
    /// Fetch `path` from `host`. Implementations must return
    /// [`FetchError::Cancelled`] promptly once `cancel` fires.
    async fn get(
        &self,
        host: &str,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<RawSnapshot, FetchError>;
}

/// reqwest-based client answering HTTP digest challenges
#[derive(Debug, Clone)]
pub struct DigestSnapshotClient {
    client: Client,
    scheme: String,
    user: String,
    pass: String,
}

impl DigestSnapshotClient {
    pub fn new(config: &CameraConfig) -> Result<Self, FetchError> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            scheme: config.scheme.clone(),
            user: config.user.clone(),
            pass: config.pass.clone(),
        })
    }

    fn url(&self, host: &str, path: &str) -> String {
        format!("{}://{}{}", self.scheme, host, path)
    }

    async fn attempt(&self, host: &str, path: &str) -> Result<RawSnapshot, FetchError> {
        let url = self.url(host, path);
        trace!(%url, "Requesting snapshot");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "image/jpeg")
            .send()
            .await?;

        let response = if response.status() == StatusCode::UNAUTHORIZED {
            let challenge = response
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|value| value.to_str().ok())
                .ok_or_else(|| FetchError::Auth("401 without a challenge".to_string()))?
                .to_string();

            let mut prompt =
                digest_auth::parse(&challenge).map_err(|e| FetchError::Auth(e.to_string()))?;
            let context = digest_auth::AuthContext::new(self.user.as_str(), self.pass.as_str(), path);
            let answer = prompt
                .respond(&context)
                .map_err(|e| FetchError::Auth(e.to_string()))?;

            debug!(%url, "Answering digest challenge");
            self.client
                .get(&url)
                .header(ACCEPT, "image/jpeg")
                .header(AUTHORIZATION, answer.to_header_string())
                .send()
                .await?
        } else {
            response
        };

        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(RawSnapshot { status, body })
    }
}

#[async_trait]
impl SnapshotClient for DigestSnapshotClient {
    async fn get(
        &self,
        host: &str,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<RawSnapshot, FetchError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.attempt(host, path) => result,
        }
    }
}
