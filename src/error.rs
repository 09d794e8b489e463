//! Error types and HTTP error response handling.
//!
//! This module defines the gateway's handler-level errors and how they are
//! converted into HTTP responses with appropriate status codes and JSON
//! bodies. Saga outcomes are not errors at this layer: a failed transfer
//! still produces a normal `TransferResponse` carrying its transaction id.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Handler-level error type.
///
/// Only requests rejected before a transaction id is minted, and lookups of
/// unknown transactions, surface as HTTP errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Invalid request")]
    InvalidRequest(String),

    /// No ledger record exists for the requested transaction id.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Transaction not found")]
    TransactionNotFound,

    /// Unexpected internal failure.
    ///
    /// Returns HTTP 500 Internal Server Error; details stay out of the
    /// response body.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convert GatewayError into an HTTP response.
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            GatewayError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            GatewayError::TransactionNotFound => (
                StatusCode::NOT_FOUND,
                "transaction_not_found",
                self.to_string(),
            ),
            GatewayError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred".to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
