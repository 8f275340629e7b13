//! Failure codes and the standard error response body.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of failure codes an operation may report.
///
/// Every code has exactly one HTTP status; the server owns that mapping.
///
/// | Wire name | HTTP status |
/// |-----------|------------|
/// | `BAD_REQUEST` | 400 |
/// | `INVALID_PARAMETER_VALUE` | 400 |
/// | `MALFORMED_REQUEST` | 400 |
/// | `INVALID_STATE` | 400 |
/// | `UNAUTHENTICATED` | 401 |
/// | `PERMISSION_DENIED` | 403 |
/// | `NOT_FOUND` | 404 |
/// | `ENDPOINT_NOT_FOUND` | 404 |
/// | `ALREADY_EXISTS` | 409 |
/// | `INTERNAL_ERROR` | 500 |
/// | `NOT_IMPLEMENTED` | 501 |
/// | `TEMPORARILY_UNAVAILABLE` | 503 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadRequest,
    InvalidParameterValue,
    MalformedRequest,
    InvalidState,
    Unauthenticated,
    PermissionDenied,
    NotFound,
    EndpointNotFound,
    AlreadyExists,
    InternalError,
    NotImplemented,
    TemporarilyUnavailable,
}

impl ErrorCode {
    /// Every variant, in declaration order.
    pub const ALL: [ErrorCode; 12] = [
        ErrorCode::BadRequest,
        ErrorCode::InvalidParameterValue,
        ErrorCode::MalformedRequest,
        ErrorCode::InvalidState,
        ErrorCode::Unauthenticated,
        ErrorCode::PermissionDenied,
        ErrorCode::NotFound,
        ErrorCode::EndpointNotFound,
        ErrorCode::AlreadyExists,
        ErrorCode::InternalError,
        ErrorCode::NotImplemented,
        ErrorCode::TemporarilyUnavailable,
    ];

    /// The wire name, e.g. `"INVALID_PARAMETER_VALUE"`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::InvalidParameterValue => "INVALID_PARAMETER_VALUE",
            Self::MalformedRequest => "MALFORMED_REQUEST",
            Self::InvalidState => "INVALID_STATE",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::NotFound => "NOT_FOUND",
            Self::EndpointNotFound => "ENDPOINT_NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::InternalError => "INTERNAL_ERROR",
            Self::NotImplemented => "NOT_IMPLEMENTED",
            Self::TemporarilyUnavailable => "TEMPORARILY_UNAVAILABLE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The uniform error value returned by every operation.
///
/// Serialises to the standard error body:
///
/// ```json
/// { "error_code": "NOT_FOUND", "message": "No Experiment with id=42 exists" }
/// ```
///
/// Fields are private so a `Failure` cannot change once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{error_code}: {message}")]
pub struct Failure {
    error_code: ErrorCode,
    message: String,
}

impl Failure {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error_code: code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.error_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParameterValue, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// The standard failure for an absent required field.
    pub fn missing_parameter(name: &str) -> Self {
        Self::invalid_parameter(format!("Missing value for required parameter '{name}'"))
    }
}
