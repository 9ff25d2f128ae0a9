/// Unified error types for the identity engine
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for identity operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Seed is not base58 or does not decode to 32 bytes
    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    /// Key identifier or identity name breaks the `#name` convention
    #[error("Invalid key identifier: {0}")]
    InvalidKeyId(String),

    /// Malformed request argument (resolver address, cache policy, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Identity has the wrong subject type for the operation
    #[error("Subject type mismatch: {0}")]
    TypeMismatch(String),

    /// A different document is already registered and override was not requested
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resolver could not be reached or timed out
    #[error("Resolver unreachable: {0}")]
    Unreachable(String),

    /// Resolver answered with an unexpected failure
    #[error("Resolver error: {0}")]
    Resolver(String),

    /// Missing, revoked or expired delegation, or an invalid token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Token duration must be a positive number of milliseconds
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IdentityError {
    /// Stable error code used in the JSON error shape
    pub fn code(&self) -> &'static str {
        match self {
            IdentityError::InvalidSeed(_) => "InvalidSeed",
            IdentityError::InvalidKeyId(_) => "InvalidKeyId",
            IdentityError::InvalidArgument(_) => "InvalidArgument",
            IdentityError::TypeMismatch(_) => "TypeMismatch",
            IdentityError::Conflict(_) => "Conflict",
            IdentityError::NotFound(_) => "NotFound",
            IdentityError::Unreachable(_) => "Unreachable",
            IdentityError::Resolver(_) => "ResolverError",
            IdentityError::Unauthorized(_) => "Unauthorized",
            IdentityError::InvalidDuration(_) => "InvalidDuration",
            IdentityError::Internal(_) => "InternalError",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            IdentityError::InvalidSeed(_)
            | IdentityError::InvalidKeyId(_)
            | IdentityError::InvalidArgument(_)
            | IdentityError::InvalidDuration(_) => StatusCode::BAD_REQUEST,
            IdentityError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            IdentityError::NotFound(_) => StatusCode::NOT_FOUND,
            IdentityError::TypeMismatch(_) | IdentityError::Conflict(_) => StatusCode::CONFLICT,
            IdentityError::Unreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            IdentityError::Resolver(_) => StatusCode::BAD_GATEWAY,
            IdentityError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<serde_json::Error> for IdentityError {
    fn from(e: serde_json::Error) -> Self {
        IdentityError::Internal(format!("JSON error: {}", e))
    }
}

/// Unreadable request bodies are bad arguments
impl From<JsonRejection> for IdentityError {
    fn from(rejection: JsonRejection) -> Self {
        IdentityError::InvalidArgument(rejection.body_text())
    }
}

/// Error response body: `{"error": ..., "message": ...}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl From<&IdentityError> for ErrorResponse {
    fn from(err: &IdentityError) -> Self {
        let message = match err {
            // Don't leak details
            IdentityError::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        };

        Self {
            error: err.code().to_string(),
            message,
        }
    }
}

/// Convert IdentityError to HTTP response
impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        if let IdentityError::Internal(detail) = &self {
            tracing::error!("internal error: {}", detail);
        }

        let body = Json(ErrorResponse::from(&self));
        (self.status(), body).into_response()
    }
}

/// Result type alias for identity operations
pub type IdentityResult<T> = Result<T, IdentityError>;
