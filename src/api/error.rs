use axum::{Json, http::StatusCode, response::IntoResponse};
use thiserror::Error;

use super::models::ApiResponse;
use crate::control::ControlError;
use crate::remote::RemoteError;
use crate::storage::StorageError;

/// Errors surfaced by the HTTP handlers.
///
/// The dashboard reads the `{"code":-1,"msg":...}` envelope rather than the
/// status line, so application failures are rendered with `200 OK`. Only
/// [`ApiError::NotFound`] (the file proxy route) maps to a real error status.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),
    #[error("payload invalid: {0}")]
    InvalidPayload(String),
    #[error(transparent)]
    Control(#[from] ControlError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("resource not found: {0}")]
    NotFound(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::OK,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::MissingParameter(_) => "MISSING_PARAMETER",
            ApiError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ApiError::Control(_) => "UNKNOWN_ACTION",
            ApiError::Storage(StorageError::PathEscape(_) | StorageError::IllegalReference(_)) => {
                "ILLEGAL_PATH"
            }
            ApiError::Storage(_) => "STORAGE_ERROR",
            ApiError::Remote(_) => "REMOTE_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        tracing::debug!(kind = self.kind(), error = %self, "Request failed");

        (status, Json(ApiResponse::error(self.to_string()))).into_response()
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::InvalidPayload(value.to_string())
    }
}
