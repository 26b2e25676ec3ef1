//! API error types and conversions

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use parkgate_core::CommandError;
use serde::Serialize;

use crate::cloud::CloudError;

/// API error type that converts to HTTP responses
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request
    BadRequest(String),
    /// 404 Not Found
    NotFound(String),
    /// 408 Request Timeout (slow multipart upload)
    RequestTimeout(String),
    /// 502 Bad Gateway (cloud call failed)
    BadGateway(String),
    /// 503 Service Unavailable
    ServiceUnavailable(String),
    /// 504 Gateway Timeout
    GatewayTimeout(String),
    /// 500 Internal Server Error
    Internal(String),
}

/// Error body understood by the gate clients
#[derive(Serialize)]
struct ErrorResponse {
    status: bool,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::RequestTimeout(msg) => (StatusCode::REQUEST_TIMEOUT, "request_timeout", msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "bad_gateway", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
            ApiError::GatewayTimeout(msg) => (StatusCode::GATEWAY_TIMEOUT, "gateway_timeout", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        // Log errors at appropriate levels
        if status.is_server_error() {
            tracing::error!(error = error_type, %message, "API error");
        } else if status.is_client_error() {
            tracing::debug!(error = error_type, %message, "API client error");
        }

        let body = Json(ErrorResponse {
            status: false,
            message,
        });

        (status, body).into_response()
    }
}

impl From<CommandError> for ApiError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::NotConfigured { key } => {
                tracing::warn!(%key, "Barrier address not configured");
                ApiError::NotFound("IP not found for this gate".to_string())
            }
            CommandError::InvalidInput(msg) => ApiError::BadRequest(msg),
            CommandError::Actuation(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<CloudError> for ApiError {
    fn from(err: CloudError) -> Self {
        match err {
            CloudError::Timeout => ApiError::GatewayTimeout("cloud request timed out".to_string()),
            CloudError::InvalidUrl(msg) => ApiError::Internal(msg),
            CloudError::Transport(msg) | CloudError::InvalidResponse(msg) => {
                ApiError::BadGateway(msg)
            }
        }
    }
}
