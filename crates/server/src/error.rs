//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fetchbox_registry::error::{Error, ErrorKind};
use serde::Serialize;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// A registry failure on its way to becoming a response.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::InvalidInput(_) => "bad_request",
            ErrorKind::NotFound(_) => "not_found",
            ErrorKind::Conflict(_) => "conflict",
            ErrorKind::Fetch => "fetch_error",
            ErrorKind::Write => "write_error",
            ErrorKind::Store => "store_error",
            ErrorKind::InconsistentState(_) => "inconsistent_state",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound(_) => StatusCode::NOT_FOUND,
            ErrorKind::Conflict(_) => StatusCode::CONFLICT,
            ErrorKind::Fetch | ErrorKind::Write | ErrorKind::Store | ErrorKind::InconsistentState(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = ?self.0, "request failed");
        }
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.kind().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
