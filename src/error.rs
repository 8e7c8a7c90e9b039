//! Error types for the offline proxy
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Worker Error Enum ==
/// Unified error type for the caching worker and its HTTP host.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Network fetch failed (connection refused, DNS, timeout, ...)
    #[error("Network error: {0}")]
    Network(String),

    /// Cache storage rejected a write (generation full or unavailable)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Request cannot be cached or forwarded as given
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Install step aborted; the previous generation stays in place
    #[error("Install failed: {0}")]
    InstallFailed(String),

    /// Neither network nor cache could answer the request
    #[error("No response available for {0}")]
    NoResponse(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for WorkerError {
    fn from(err: reqwest::Error) -> Self {
        WorkerError::Network(err.to_string())
    }
}

impl From<url::ParseError> for WorkerError {
    fn from(err: url::ParseError) -> Self {
        WorkerError::InvalidRequest(format!("invalid URL: {}", err))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for WorkerError {
    fn into_response(self) -> Response {
        let status = match &self {
            WorkerError::Network(_) => StatusCode::BAD_GATEWAY,
            WorkerError::Storage(_) => StatusCode::INSUFFICIENT_STORAGE,
            WorkerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            WorkerError::InstallFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            WorkerError::NoResponse(_) => StatusCode::GATEWAY_TIMEOUT,
            WorkerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the offline proxy.
pub type Result<T> = std::result::Result<T, WorkerError>;
