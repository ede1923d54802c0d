//! Authentication middleware for protected routes.
//!
//! Extracts the Bearer token from the Authorization header, verifies it,
//! and injects the [`VerifiedIdentity`] into request extensions. A missing
//! or malformed header is rejected before the verifier runs. Group guards
//! built on [`AccessPolicy`] sit behind this middleware; verification
//! failures are 401 and authorization denials are 403, never conflated.

use crate::auth::claims::VerifiedIdentity;
use crate::auth::verifier::TokenVerifier;
use crate::authz::{AccessPolicy, AccessQuery, Decision, DenyReason};
use crate::errors::IdentityError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Token verifier with its key cache.
    pub verifier: Arc<TokenVerifier>,

    /// Authorization policy for group guards.
    pub policy: Arc<AccessPolicy>,
}

/// Authentication middleware that verifies bearer tokens.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// # Response
///
/// - 401 Unauthorized (with `WWW-Authenticate`) when the header is absent,
///   not Bearer-shaped, or the token fails verification
/// - 503 Service Unavailable when the key set is unreachable with nothing
///   cached
/// - Continues to the next handler with the identity in extensions
///   otherwise
///
/// # Errors
///
/// Returns `IdentityError` for every rejection; the response body carries
/// only the generic message.
#[instrument(skip(state, req, next), name = "identity.middleware.auth")]
pub async fn authenticate(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, IdentityError> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "identity.middleware.auth", "Missing Authorization header");
            IdentityError::Unauthenticated("missing Authorization header".to_string())
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::debug!(target: "identity.middleware.auth", "Invalid Authorization header format");
        IdentityError::Unauthenticated("Authorization header is not a Bearer credential".to_string())
    })?;

    let identity = state.verifier.verify(token).await?;

    // Store the identity in request extensions for downstream handlers
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

/// Build a guard middleware requiring membership in any of `groups`.
///
/// Layer it behind [`authenticate`] with `axum::middleware::from_fn`. The
/// admin group always passes via the policy's override. A request that
/// never went through [`authenticate`] is rejected as unauthenticated, not
/// forbidden.
pub fn require_any_group(
    policy: Arc<AccessPolicy>,
    groups: Vec<String>,
) -> impl Fn(Request, Next) -> Pin<Box<dyn Future<Output = Result<Response, IdentityError>> + Send>>
       + Clone {
    move |req: Request, next: Next| {
        let policy = Arc::clone(&policy);
        let groups = groups.clone();
        Box::pin(async move {
            let decision = policy.authorize(&AccessQuery {
                identity: req.extensions().get::<VerifiedIdentity>(),
                required_groups: &groups,
                resource_owner: None,
            });

            match decision {
                Decision::Allow => Ok(next.run(req).await),
                Decision::Deny(DenyReason::MissingIdentity) => {
                    tracing::debug!(target: "identity.middleware.auth", "No verified identity on request");
                    Err(IdentityError::Unauthenticated(
                        "no verified identity on request".to_string(),
                    ))
                }
                Decision::Deny(reason) => {
                    tracing::debug!(target: "identity.middleware.auth", reason = ?reason, "Group guard denied request");
                    Err(IdentityError::Forbidden(
                        "insufficient permissions".to_string(),
                    ))
                }
            }
        })
    }
}

/// Extension trait for extracting the verified identity from a request.
///
/// Provides a convenient method for handlers behind [`authenticate`].
pub trait IdentityExt {
    /// Get the authenticated identity from request extensions.
    ///
    /// Returns `None` if the auth middleware was not applied to this
    /// request.
    fn identity(&self) -> Option<&VerifiedIdentity>;
}

impl<B> IdentityExt for axum::extract::Request<B> {
    fn identity(&self) -> Option<&VerifiedIdentity> {
        self.extensions().get::<VerifiedIdentity>()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    // Full middleware behavior (401/403 separation, identity injection)
    // requires a mocked JWKS endpoint and is covered in integration tests.
    // Unit tests here focus on types.

    use super::*;

    #[test]
    fn test_auth_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AuthState>();
    }
}
