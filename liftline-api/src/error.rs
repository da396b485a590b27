//! API error handling.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use liftline_core::LiftlineError;

use crate::dto::ErrorResponse;

/// API error type.
///
/// Bodies are always `{ "error": "<generic message>" }`; the underlying
/// cause is logged, never returned.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(status: StatusCode, message: &'static str) -> Self {
        Self { status, message }
    }

    /// 404 for keys outside the resort table.
    pub fn unknown_resort() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Unknown resort")
    }

    /// 503 for routes that only distinguish "have data" from "don't".
    pub fn no_data(err: &LiftlineError) -> Self {
        warn!(error = %err, "No data to serve");
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "No data available yet")
    }

    /// Status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<LiftlineError> for ApiError {
    fn from(err: LiftlineError) -> Self {
        match &err {
            LiftlineError::NotFound(_) | LiftlineError::UnknownResort(_) => {
                ApiError::new(StatusCode::NOT_FOUND, "Not found")
            }
            LiftlineError::Unavailable(_) => {
                warn!(error = %err, "Rejected at capacity");
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "Busy, try again shortly")
            }
            LiftlineError::InternalError(_) | LiftlineError::ConfigError(_) => {
                error!(error = %err, "Internal error");
                ApiError::new(StatusCode::BAD_GATEWAY, "Upstream fetch failed")
            }
            _ => {
                warn!(error = %err, "Upstream fetch failed");
                ApiError::new(StatusCode::BAD_GATEWAY, "Upstream fetch failed")
            }
        }
    }
}
