//! HTTP error mapping.
//!
//! Service errors carry a grepable code through `ErrorCode`; this module is
//! the only place those codes become status codes. Response bodies are
//! `{ "code": ..., "message": ... }`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::frame::ErrorCode;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    retryable: bool,
}

/// Status code for a service error code.
#[must_use]
pub fn status_for(code: &str) -> StatusCode {
    match code {
        "E_NOT_FOUND" => StatusCode::NOT_FOUND,
        "E_UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
        "E_FORBIDDEN" => StatusCode::FORBIDDEN,
        "E_SLOT_TAKEN" | "E_ORDER_NOT_PENDING" | "E_INSUFFICIENT_STOCK" | "E_DUPLICATE" => StatusCode::CONFLICT,
        "E_RATE_LIMITED" => StatusCode::TOO_MANY_REQUESTS,
        "E_TOO_LARGE" => StatusCode::PAYLOAD_TOO_LARGE,
        "E_MAIL_DISABLED" => StatusCode::SERVICE_UNAVAILABLE,
        "E_MAIL_DELIVERY" => StatusCode::BAD_GATEWAY,
        "E_DATABASE" | "E_INTERNAL" => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

impl ApiError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self { status: status_for(code), code, message: message.into() }
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new("E_UNAUTHORIZED", "sign in required")
    }

    #[must_use]
    pub fn forbidden() -> Self {
        Self::new("E_FORBIDDEN", "not allowed for this role")
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("E_INVALID_INPUT", message)
    }
}

impl<E: ErrorCode> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self::new(err.error_code(), err.to_string())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::new("E_DATABASE", err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Internal details stay in the log.
        let message = if self.status.is_server_error() && self.code != "E_MAIL_DISABLED" {
            tracing::error!(code = self.code, error = %self.message, "request failed");
            "internal error"
        } else {
            self.message.as_str()
        };
        let body = ErrorBody { code: self.code, message, retryable: self.code == "E_DATABASE" };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
