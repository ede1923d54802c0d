//! Middleware integration tests.
//!
//! Drives an axum router through `tower::ServiceExt::oneshot` to verify
//! bearer extraction, identity injection, and the 401/403 separation
//! between verification failures and authorization denials.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::{middleware, Extension, Json, Router};
use http_body_util::BodyExt;
use identity::auth::claims::VerifiedIdentity;
use identity::auth::jwks::JwksCache;
use identity::auth::verifier::TokenVerifier;
use identity::authz::{AccessPolicy, GROUP_ADMIN, GROUP_REVIEWERS};
use identity::middleware::{authenticate, require_any_group, AuthState};
use identity_test_utils::{test_jwks_document, MockJwks, TestTokenBuilder, TEST_KID};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn me(Extension(identity): Extension<VerifiedIdentity>) -> Json<Value> {
    let mut groups: Vec<String> = identity.groups.iter().cloned().collect();
    groups.sort();
    Json(json!({
        "sub": identity.subject,
        "username": identity.username,
        "groups": groups,
    }))
}

async fn reviewer_report() -> Json<Value> {
    Json(json!({ "report": "ok" }))
}

/// Router with a protected `/me` and a reviewer-gated `/reports`.
fn build_app(jwks: &MockJwks) -> Router {
    let config = jwks.config();
    let cache = Arc::new(JwksCache::from_config(&config));
    let state = Arc::new(AuthState {
        verifier: Arc::new(TokenVerifier::new(&config, cache)),
        policy: Arc::new(AccessPolicy::from_config(&config)),
    });

    let guarded = Router::new()
        .route("/reports", get(reviewer_report))
        .layer(middleware::from_fn(require_any_group(
            Arc::clone(&state.policy),
            vec![GROUP_REVIEWERS.to_string()],
        )));

    Router::new()
        .route("/me", get(me))
        .merge(guarded)
        .layer(middleware::from_fn_with_state(state, authenticate))
}

async fn get_with_auth(
    app: Router,
    uri: &str,
    authorization: Option<&str>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().uri(uri);
    if let Some(value) = authorization {
        builder = builder.header("authorization", value);
    }
    let request = builder.body(Body::empty())?;

    let response = app.oneshot(request).await?;
    let status = response.status();
    let bytes = response.into_body().collect().await?.to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, body))
}

#[tokio::test]
async fn test_missing_authorization_header_is_401() -> Result<()> {
    let jwks = MockJwks::start().await;
    jwks.serve_keys(test_jwks_document(&[TEST_KID])).await;
    let app = build_app(&jwks);

    let request = Request::builder().uri("/me").body(Body::empty())?;
    let response = app.oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let www_auth = response.headers().get("WWW-Authenticate");
    assert!(www_auth.is_some(), "401 should carry WWW-Authenticate");
    assert!(www_auth
        .unwrap()
        .to_str()?
        .contains("Bearer realm=\"timecard-api\""));

    Ok(())
}

#[tokio::test]
async fn test_non_bearer_authorization_is_401() -> Result<()> {
    let jwks = MockJwks::start().await;
    jwks.serve_keys(test_jwks_document(&[TEST_KID])).await;
    let app = build_app(&jwks);

    let (status, body) = get_with_auth(app, "/me", Some("Basic abc123")).await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");

    Ok(())
}

#[tokio::test]
async fn test_valid_token_reaches_handler_with_identity() -> Result<()> {
    let jwks = MockJwks::start().await;
    jwks.serve_keys(test_jwks_document(&[TEST_KID])).await;
    let app = build_app(&jwks);

    let token = TestTokenBuilder::new()
        .for_subject("42")
        .with_username("alice")
        .with_groups(&["user-group"])
        .sign();

    let (status, body) = get_with_auth(app, "/me", Some(&format!("Bearer {token}"))).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sub"], "42");
    assert_eq!(body["username"], "alice");
    assert_eq!(body["groups"], json!(["user-group"]));

    Ok(())
}

/// Verification failures stay generic: the gate that rejected the token is
/// not revealed to the client.
#[tokio::test]
async fn test_invalid_token_response_is_generic() -> Result<()> {
    let jwks = MockJwks::start().await;
    jwks.serve_keys(test_jwks_document(&[TEST_KID])).await;
    let app = build_app(&jwks);

    let token = TestTokenBuilder::new().expires_in(-600).sign();

    let (status, body) = get_with_auth(app, "/me", Some(&format!("Bearer {token}"))).await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");
    assert_eq!(
        body["error"]["message"],
        "The access token is invalid or expired"
    );

    Ok(())
}

/// A verified identity lacking the required group is forbidden, not
/// unauthenticated.
#[tokio::test]
async fn test_group_guard_denies_with_403() -> Result<()> {
    let jwks = MockJwks::start().await;
    jwks.serve_keys(test_jwks_document(&[TEST_KID])).await;
    let app = build_app(&jwks);

    let token = TestTokenBuilder::new()
        .for_subject("42")
        .with_groups(&["user-group"])
        .sign();

    let (status, body) = get_with_auth(app, "/reports", Some(&format!("Bearer {token}"))).await?;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    Ok(())
}

#[tokio::test]
async fn test_group_guard_allows_member() -> Result<()> {
    let jwks = MockJwks::start().await;
    jwks.serve_keys(test_jwks_document(&[TEST_KID])).await;
    let app = build_app(&jwks);

    let token = TestTokenBuilder::new()
        .for_subject("7")
        .with_groups(&[GROUP_REVIEWERS])
        .sign();

    let (status, body) = get_with_auth(app, "/reports", Some(&format!("Bearer {token}"))).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"], "ok");

    Ok(())
}

/// The admin override passes group guards it is not named in.
#[tokio::test]
async fn test_admin_passes_group_guard() -> Result<()> {
    let jwks = MockJwks::start().await;
    jwks.serve_keys(test_jwks_document(&[TEST_KID])).await;
    let app = build_app(&jwks);

    let token = TestTokenBuilder::new()
        .for_subject("1")
        .with_groups(&[GROUP_ADMIN])
        .sign();

    let (status, _body) = get_with_auth(app, "/reports", Some(&format!("Bearer {token}"))).await?;

    assert_eq!(status, StatusCode::OK);

    Ok(())
}

/// A cold cache with an unreachable key endpoint is 503, not 401: the
/// client's token was never judged.
#[tokio::test]
async fn test_unreachable_key_endpoint_is_503_when_cold() -> Result<()> {
    let jwks = MockJwks::start().await;
    jwks.serve_error(500).await;
    let app = build_app(&jwks);

    let token = TestTokenBuilder::new().sign();

    let (status, body) = get_with_auth(app, "/me", Some(&format!("Bearer {token}"))).await?;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");

    Ok(())
}
