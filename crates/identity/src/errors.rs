//! Identity core error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse`
//! impl. Error messages returned to clients are intentionally generic to
//! avoid leaking which verification gate rejected a token. Actual reasons
//! are logged server-side.

use crate::auth::jwks::KeyResolveError;
use crate::auth::verifier::VerificationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Identity core error type.
///
/// Maps to appropriate HTTP status codes:
/// - Unauthenticated: 401 Unauthorized (token missing, malformed, or failed
///   verification; the retained reason is logged, never echoed)
/// - Forbidden: 403 Forbidden (authorization denial over a verified identity)
/// - `ServiceUnavailable`: 503 Service Unavailable (key set unreachable with
///   nothing cached)
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl IdentityError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            IdentityError::Unauthenticated(_) => 401,
            IdentityError::Forbidden(_) => 403,
            IdentityError::ServiceUnavailable(_) => 503,
        }
    }
}

/// A cold-cache fetch failure means the verifier had nothing to check the
/// signature against; every other verification failure is the client's token.
impl From<VerificationError> for IdentityError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::UnresolvableKey(KeyResolveError::Fetch(reason)) => {
                IdentityError::ServiceUnavailable(reason)
            }
            other => IdentityError::Unauthenticated(format!("{other:?}")),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            IdentityError::Unauthenticated(reason) => {
                // Log the distinguishing reason server-side, return the
                // generic message to the client (no verification oracle)
                tracing::debug!(target: "identity.errors", reason = %reason, "Request unauthenticated");
                (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_TOKEN",
                    "The access token is invalid or expired".to_string(),
                )
            }
            IdentityError::Forbidden(reason) => {
                tracing::debug!(target: "identity.errors", reason = %reason, "Request forbidden");
                (StatusCode::FORBIDDEN, "FORBIDDEN", reason.clone())
            }
            IdentityError::ServiceUnavailable(reason) => {
                tracing::warn!(target: "identity.errors", reason = %reason, "Authentication service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable".to_string(),
                )
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) =
                "Bearer realm=\"timecard-api\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
