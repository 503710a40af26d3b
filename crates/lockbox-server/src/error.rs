//! HTTP error types for the Lockbox server.
//!
//! Maps store and authorization outcomes into HTTP responses. Every
//! error variant produces a JSON body with a machine-readable `error`
//! field and a human-readable `message`.
//!
//! Two mappings matter for correctness:
//!
//! - An access *denial* maps to 403 (404 for `ResourceNotFound`) via
//!   [`ApiError::from_denial`]. The deny reason is diagnostic text only.
//! - An [`AuthzError`] is an infrastructure failure and maps to 500 —
//!   never to 401/403, so "store unreachable" can never masquerade as
//!   "unauthorized".

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use lockbox_authz::{AuthzError, DenyReason};
use lockbox_store::StoreError;

/// Application-level error returned from HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Authentication failed or token invalid.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The authorization engine denied the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Client sent invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Resource already exists or the write violated a constraint.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal error (store, infrastructure).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Map an access denial to its HTTP form. The reason string is a
    /// diagnostic, not an authorization contract.
    #[must_use]
    pub fn from_denial(reason: DenyReason) -> Self {
        match reason {
            DenyReason::ResourceNotFound => Self::NotFound("resource not found".to_owned()),
            DenyReason::NoAclPermissionsFound
            | DenyReason::MissingPermissions
            | DenyReason::MissingPermissionsForAdmin => {
                Self::Forbidden(format!("access denied ({reason})"))
            }
        }
    }
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".to_owned(),
                )
            }
        };

        let body = ErrorBody {
            error: error_type,
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Constraint { .. } => Self::Conflict(err.to_string()),
            StoreError::Connection { .. } | StoreError::Query { .. } | StoreError::Decode { .. } => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        // Infrastructure only — denials never arrive through this path.
        Self::Internal(err.to_string())
    }
}
