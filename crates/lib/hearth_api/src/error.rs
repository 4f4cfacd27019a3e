//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use hearth_core::error::FieldErrors;
use serde::Serialize;
use thiserror::Error;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Message used for every 500 response.
pub const INTERNAL_MESSAGE: &str = "Something went wrong while processing your request.";

/// Uniform JSON error body: `{"status", "message", "data"}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub message: String,
    pub data: FieldErrors,
}

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error")]
    Validation(FieldErrors),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request entity too large")]
    PayloadTooLarge,

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, data) = match self {
            AppError::Validation(fields) => (
                "Failed to validate the submitted data.".to_string(),
                fields,
            ),
            AppError::BadRequest(m)
            | AppError::Unauthorized(m)
            | AppError::Forbidden(m)
            | AppError::NotFound(m) => (m, FieldErrors::new()),
            AppError::PayloadTooLarge => ("Request entity too large.".into(), FieldErrors::new()),
            AppError::TooManyRequests => ("Too Many Requests.".into(), FieldErrors::new()),
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "internal error");
                (INTERNAL_MESSAGE.into(), FieldErrors::new())
            }
        };
        let body = Json(ErrorResponse {
            status: status.as_u16(),
            message,
            data,
        });
        (status, body).into_response()
    }
}

impl From<hearth_core::Error> for AppError {
    fn from(e: hearth_core::Error) -> Self {
        use hearth_core::Error;
        match e {
            Error::Validation(fields) => AppError::Validation(fields),
            Error::BadRequest(msg) => AppError::BadRequest(msg),
            Error::Unauthorized(msg) => AppError::Unauthorized(msg),
            Error::Forbidden(msg) => AppError::Forbidden(msg),
            Error::NotFound(msg) => AppError::NotFound(msg),
            Error::TooManyRequests => AppError::TooManyRequests,
            Error::Internal(msg) => AppError::Internal(msg),
        }
    }
}
