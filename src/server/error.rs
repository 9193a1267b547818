//! Error-to-HTTP response conversion.
//!
//! Lets batch route handlers return `Result<T, AppError>` directly.

use crate::batch::BatchError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "not_found",
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<BatchError> for AppError {
    fn from(e: BatchError) -> Self {
        let (status, code) = match e {
            BatchError::CapacityExceeded { .. } => (StatusCode::CONFLICT, "capacity_exceeded"),
            BatchError::ItemNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            BatchError::InvalidConcurrency => (StatusCode::BAD_REQUEST, "invalid_concurrency"),
        };
        Self {
            status,
            code,
            message: e.to_string(),
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        Self {
            status: e.status(),
            code: "bad_request",
            message: e.body_text(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "Server error in API handler");
        }

        let body = json!({
            "error": self.message,
            "code": self.code,
        });

        (self.status, axum::Json(body)).into_response()
    }
}
