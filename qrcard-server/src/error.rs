//! Error types for qrcard-server
//!
//! Every handler failure is converted at the boundary into the JSON envelope
//! `{"success": false, "error": "..."}`.

use axum::{
    extract::rejection::{FormRejection, JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request could not be parsed (400)
    #[error("{0}")]
    BadRequest(String),

    /// qrcard-common error
    #[error(transparent)]
    Common(#[from] qrcard_common::Error),
}

impl ApiError {
    fn status_and_message(self) -> (StatusCode, String) {
        use qrcard_common::Error as Common;

        match self {
            ApiError::Common(Common::NotFound(msg)) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) | ApiError::Common(Common::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, msg)
            }
            other => {
                // Details stay in the log; clients get a generic message
                error!("Request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        let body = Json(json!({
            "success": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
