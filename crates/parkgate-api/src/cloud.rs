//! Parking cloud API client
//!
//! The gateway reports sightings to, and asks decisions of, a remote parking
//! management service. Every call carries a finite timeout and the response
//! is kept as loosely typed JSON: the service's payloads are relayed to the
//! gate clients largely as-is.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

// =============================================================================
// Endpoints
// =============================================================================

pub const SIGHTING_PATH: &str = "/api/v1-202402/order/parking_license_plate";
pub const CUSTOMER_LOOKUP_PATH: &str = "/api/v2-202402/order/get-customer-id";
pub const EXIT_CHECK_PATH: &str = "/api/v1-202402/order/license-plate-exit";
pub const COLLECT_IMAGE_PATH: &str = "/api/v1-202401/image/collect-image";
pub const ZONING_TRANSITION_PATH: &str = "/api/v1-202402/zoning/transition";
pub const ZONING_COLLECT_IMAGE_PATH: &str = "/api/v1-202402/zoning/collect-image";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CloudError {
    #[error("Invalid cloud URL: {0}")]
    InvalidUrl(String),

    #[error("Cloud request failed: {0}")]
    Transport(String),

    #[error("Cloud request timed out")]
    Timeout,

    #[error("Invalid cloud response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for CloudError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CloudError::Timeout
        } else if e.is_decode() {
            CloudError::InvalidResponse(e.to_string())
        } else {
            CloudError::Transport(e.to_string())
        }
    }
}

/// HTTP status and decoded JSON body of a cloud call
#[derive(Debug, Clone, PartialEq)]
pub struct CloudReply {
    pub status: u16,
    pub body: Value,
}

impl CloudReply {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    /// Top-level `status` flag, accepting `true`, `"true"` and non-zero numbers
    pub fn is_success(&self) -> bool {
        boolish(self.body.get("status"))
    }

    /// Top-level `status` only when it is a JSON boolean
    pub fn status_flag(&self) -> Option<bool> {
        self.body.get("status").and_then(Value::as_bool)
    }

    pub fn message(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }

    pub fn data(&self) -> Option<&Value> {
        self.body.get("data")
    }

    /// `data.uuid` when it is a non-empty string
    pub fn data_uuid(&self) -> Option<&str> {
        self.data()
            .and_then(|data| data.get("uuid"))
            .and_then(Value::as_str)
            .filter(|uuid| !uuid.is_empty())
    }
}

pub(crate) fn boolish(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

/// Calls made to the parking cloud
#[async_trait]
pub trait CloudApi: Send + Sync {
    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<CloudReply, CloudError>;

    async fn post_json(&self, path: &str, body: &Value) -> Result<CloudReply, CloudError>;

    async fn put_json(&self, path: &str, body: &Value) -> Result<CloudReply, CloudError>;
}

/// reqwest-backed cloud client
#[derive(Debug, Clone)]
pub struct HttpCloudClient {
    client: Client,
    base_url: Url,
}

impl HttpCloudClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CloudError> {
        let base_url = Url::parse(base_url).map_err(|e| CloudError::InvalidUrl(e.to_string()))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CloudError::Transport(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append `path` to the base URL's own path
    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let joined = format!(
            "{}/{}",
            self.base_url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
        url
    }

    async fn decode(response: reqwest::Response) -> Result<CloudReply, CloudError> {
        let status = response.status().as_u16();
        let body = response.json::<Value>().await?;
        debug!(status, "Cloud response");
        Ok(CloudReply { status, body })
    }
}

#[async_trait]
impl CloudApi for HttpCloudClient {
    #[instrument(skip(self, query))]
    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<CloudReply, CloudError> {
        let mut url = self.endpoint(path);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        let response = self.client.get(url).send().await?;
        Self::decode(response).await
    }

    #[instrument(skip(self, body))]
    async fn post_json(&self, path: &str, body: &Value) -> Result<CloudReply, CloudError> {
        let response = self.client.post(self.endpoint(path)).json(body).send().await?;
        Self::decode(response).await
    }

    #[instrument(skip(self, body))]
    async fn put_json(&self, path: &str, body: &Value) -> Result<CloudReply, CloudError> {
        let response = self.client.put(self.endpoint(path)).json(body).send().await?;
        Self::decode(response).await
    }
}
