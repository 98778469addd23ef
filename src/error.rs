//! Error types for the cache layer
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Storage Error ==
/// Durable tier failure. Never surfaced to callers of the store: it is
/// logged and the operation falls back to the volatile tier.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Underlying medium could not be read or written
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Record or payload could not be encoded or decoded
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend refused the write (quota exhausted, read-only, ...)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

// == Fetch Error ==
/// Irrecoverable failure of a cached fetch.
///
/// Only returned after the stale fallback found nothing to serve.
/// Variants carry owned strings so one failure can be handed to every
/// caller waiting on a coalesced request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Request never completed
    #[error("Network error: {0}")]
    Network(String),

    /// Request completed with a non-2xx status
    #[error("HTTP {status}: {status_text}")]
    Status { status: u16, status_text: String },

    /// Response carried no JSON content-type
    #[error("invalid response content type")]
    InvalidContentType,

    /// Body was not valid JSON, or did not match the requested type
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Network(err.to_string())
    }
}

// == API Error ==
/// Error type for the local cache service.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Backend fetch failed and no cached value was available
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Fetch(_) => StatusCode::BAD_GATEWAY,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache service handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
