//! API error type mapping core errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use oppminer_core::error::StorageError;

/// Error returned by route handlers.
#[derive(Debug)]
pub enum ApiError {
    /// Request payload failed validation.
    BadRequest(String),
    /// The requested resource does not exist.
    NotFound(String),
    /// A storage operation failed.
    Storage(StorageError),
}

impl From<StorageError> for ApiError {
    fn from(source: StorageError) -> Self {
        ApiError::Storage(source)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Storage(source) => {
                tracing::error!(error = %source, "storage error in request handler");
                (StatusCode::INTERNAL_SERVER_ERROR, source.to_string())
            }
        };
        (status, Json(json!({"success": false, "error": message}))).into_response()
    }
}
