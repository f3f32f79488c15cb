//! Cart error types with HTTP status code mapping.
//!
//! [`CartError`] is the central error type for the gateway. Every variant
//! belongs to one [`ErrorKind`], carries a machine-readable code and a
//! human-readable message, and maps to a structured JSON error response.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": "cart_not_enough_stock",
///     "message": "You cannot add that amount of \"Mug\" to the cart because there is not enough stock (3 remaining).",
///     "status": 403,
///     "data": { "stock_quantity": 3.0 }
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with machine code, message and status.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g. `cart_invalid_quantity`).
    pub code: &'static str,
    /// Human-readable error message.
    pub message: String,
    /// HTTP status code repeated in the body for clients that lose headers.
    pub status: u16,
    /// Optional structured details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Broad classification of a [`CartError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Referenced product, variation, or cart line does not exist.
    NotFound,
    /// Malformed identifier, non-numeric quantity, missing field.
    InvalidInput,
    /// Sold-individually conflict, quantity outside bounds, not purchasable.
    PolicyViolation,
    /// Insufficient stock, reservations included.
    StockConflict,
    /// A post-condition check failed.
    Conflict,
    /// The persistence layer is unavailable.
    StorageFailure,
}

/// Server-side error enum with HTTP status code mapping.
///
/// | Kind            | HTTP Status                 |
/// |-----------------|-----------------------------|
/// | NotFound        | 404 Not Found               |
/// | InvalidInput    | 400 Bad Request             |
/// | PolicyViolation | 403 Forbidden               |
/// | StockConflict   | 403 Forbidden               |
/// | Conflict        | 409 Conflict                |
/// | StorageFailure  | 500 Internal Server Error   |
#[derive(Debug, thiserror::Error)]
pub enum CartError {
    /// Referenced resource does not exist.
    #[error("{message}")]
    NotFound {
        /// Machine-readable code.
        code: &'static str,
        /// Human-readable message.
        message: String,
    },

    /// Request input could not be interpreted.
    #[error("{message}")]
    InvalidInput {
        /// Machine-readable code.
        code: &'static str,
        /// Human-readable message.
        message: String,
    },

    /// A cart or product policy rejected the mutation.
    #[error("{message}")]
    PolicyViolation {
        /// Machine-readable code.
        code: &'static str,
        /// Human-readable message.
        message: String,
        /// Optional structured details.
        data: Option<serde_json::Value>,
    },

    /// Not enough stock for the requested quantity.
    #[error("{message}")]
    StockConflict {
        /// Machine-readable code.
        code: &'static str,
        /// Human-readable message.
        message: String,
        /// Optional structured details.
        data: Option<serde_json::Value>,
    },

    /// Stored state contradicts what the operation just wrote.
    #[error("{message}")]
    Conflict {
        /// Machine-readable code.
        code: &'static str,
        /// Human-readable message.
        message: String,
    },

    /// Persistence layer failure.
    #[error("storage failure: {0}")]
    StorageFailure(String),
}

impl CartError {
    /// Builds a [`CartError::NotFound`].
    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::NotFound {
            code,
            message: message.into(),
        }
    }

    /// Builds a [`CartError::InvalidInput`].
    pub fn invalid(code: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            code,
            message: message.into(),
        }
    }

    /// Builds a [`CartError::PolicyViolation`] without extra data.
    pub fn policy(code: &'static str, message: impl Into<String>) -> Self {
        Self::PolicyViolation {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Builds a [`CartError::StockConflict`] carrying structured details.
    pub fn stock(code: &'static str, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self::StockConflict {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Builds a [`CartError::Conflict`].
    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
        }
    }

    /// Returns the broad kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::PolicyViolation { .. } => ErrorKind::PolicyViolation,
            Self::StockConflict { .. } => ErrorKind::StockConflict,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::StorageFailure(_) => ErrorKind::StorageFailure,
        }
    }

    /// Returns the machine-readable error code for this error.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { code, .. }
            | Self::InvalidInput { code, .. }
            | Self::PolicyViolation { code, .. }
            | Self::StockConflict { code, .. }
            | Self::Conflict { code, .. } => *code,
            Self::StorageFailure(_) => "cart_storage_failure",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::PolicyViolation | ErrorKind::StockConflict => StatusCode::FORBIDDEN,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::StorageFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn data(&self) -> Option<serde_json::Value> {
        match self {
            Self::PolicyViolation { data, .. } | Self::StockConflict { data, .. } => data.clone(),
            _ => None,
        }
    }
}

impl From<JsonRejection> for CartError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid("cart_invalid_body", rejection.body_text())
    }
}

impl IntoResponse for CartError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.kind() == ErrorKind::StorageFailure {
            tracing::error!(error = %self, "cart storage failure");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                status: status.as_u16(),
                data: self.data(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
