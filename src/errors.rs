//! Error types and handling for the comparison API.
//!
//! Defines a unified error type using `thiserror` with variants for common
//! failure scenarios. Includes Axum integration for HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Application error type with variants for different failure scenarios.
///
/// Fetch and parse variants stay confined to the extractor that produced
/// them; only `Validation` and `Internal` reach the HTTP boundary.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed client input (missing or unparseable query parameters)
    #[error("{0}")]
    Validation(String),

    /// Transport-level failures (timeouts, connection resets, DNS)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Final 403/429/503 after retries were exhausted
    #[error("Blocked by upstream ({status}): {url}")]
    Blocked { status: u16, url: String },

    /// Any other non-2xx response
    #[error("Unexpected status {status} from {url}")]
    BadStatus { status: u16, url: String },

    /// Content-encoding decode failures
    #[error("Decode error: {0}")]
    Decode(String),

    /// HTML/JSON parsing errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Exchange-rate provider failures
    #[error("Exchange rate error: {0}")]
    ExchangeRate(String),

    /// Internal server errors (unexpected failures)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Maps error variants to appropriate HTTP status codes.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Transport(_) | AppError::Blocked { .. } | AppError::BadStatus { .. } => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Decode(_) | AppError::Parse(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ExchangeRate(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True when the fetcher should retry the request that produced this status.
    pub fn is_retryable_status(status: u16) -> bool {
        matches!(status, 403 | 429 | 503)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Internal details never leak to clients
        let message = match &self {
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let body = Json(crate::models::ComparisonResponse::failure(message));

        (status, body).into_response()
    }
}
