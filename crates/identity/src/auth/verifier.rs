//! Bearer-token verification.
//!
//! Validates incoming tokens against the public keys published by the
//! identity provider, then checks the semantic claims one gate at a time.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only the RS256/RS384/RS512 family is accepted; a token asserting any
//!   other algorithm is rejected before key resolution, even if a key of
//!   that kind happens to be cached
//! - Every gate reports a distinct reason for logging; clients receive a
//!   generic message

use crate::auth::claims::{CognitoClaims, TokenUse, VerifiedIdentity};
use crate::auth::jwks::{JwksCache, KeyResolveError};
use crate::config::Config;
use chrono::{DateTime, TimeZone, Utc};
use common::jwt::inspect_header;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, Validation};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Verification failures, one variant per gate.
///
/// Display output is intentionally generic for every variant; the variant
/// itself carries the distinguishing reason for server-side logging.
#[derive(Error, Debug)]
pub enum VerificationError {
    /// Token is oversized, not three segments, or not decodable.
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token header carries no usable `kid`.
    #[error("The access token is invalid or expired")]
    MissingKeyId,

    /// The signing key could not be resolved.
    #[error("The access token is invalid or expired")]
    UnresolvableKey(#[from] KeyResolveError),

    /// Signature check failed, or the asserted algorithm is outside the
    /// accepted family.
    #[error("The access token is invalid or expired")]
    InvalidSignature,

    /// Issuer does not exactly match the configured issuer.
    #[error("The access token is invalid or expired")]
    InvalidIssuer,

    /// Configured audience absent from the token's audience list.
    #[error("The access token is invalid or expired")]
    InvalidAudience,

    /// `token_use` absent or outside the accepted set.
    #[error("The access token is invalid or expired")]
    InvalidTokenUse,

    /// Token expiry is not strictly in the future.
    #[error("The access token is invalid or expired")]
    ExpiredToken,

    /// Token `nbf` is in the future.
    #[error("The access token is invalid or expired")]
    TokenNotYetValid,
}

/// Token verifier bound to one issuer, audience, and key cache.
///
/// Stateless per call; any number of verifications may run in parallel
/// against the shared cache.
pub struct TokenVerifier {
    jwks_cache: Arc<JwksCache>,
    issuer: String,
    audience: String,
    accepted_token_uses: Vec<TokenUse>,
}

impl TokenVerifier {
    /// Create a verifier from configuration and a shared key cache.
    #[must_use]
    pub fn new(config: &Config, jwks_cache: Arc<JwksCache>) -> Self {
        Self {
            jwks_cache,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            accepted_token_uses: config.accepted_token_uses.clone(),
        }
    }

    /// Verify a bearer token and produce the authenticated identity.
    ///
    /// Gates run in order and the first failure short-circuits:
    /// structural parse, algorithm family + `kid`, key resolution,
    /// signature, then each semantic claim with its own error.
    ///
    /// # Errors
    ///
    /// Returns the [`VerificationError`] variant naming the failed gate.
    #[instrument(skip_all)]
    pub async fn verify(&self, token: &str) -> Result<VerifiedIdentity, VerificationError> {
        let header = inspect_header(token).map_err(|e| {
            tracing::debug!(target: "identity.auth.jwt", error = ?e, "Token header inspection failed");
            VerificationError::MalformedToken
        })?;

        // Algorithm-substitution guard: the family check happens before the
        // kid is even considered, so an attacker-chosen alg never selects a
        // key and a missing kid never masks a bad algorithm
        let algorithm = match header.alg.as_str() {
            "RS256" => Algorithm::RS256,
            "RS384" => Algorithm::RS384,
            "RS512" => Algorithm::RS512,
            other => {
                tracing::warn!(target: "identity.auth.jwt", alg = %other, "Token asserts unaccepted signing algorithm");
                return Err(VerificationError::InvalidSignature);
            }
        };

        let kid = header.kid.ok_or_else(|| {
            tracing::debug!(target: "identity.auth.jwt", "Token header carries no usable kid");
            VerificationError::MissingKeyId
        })?;

        let key = self.jwks_cache.resolve(&kid).await?;

        // Claim gates run below with per-reason errors; the library only
        // checks the signature here
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let token_data = decode::<CognitoClaims>(token, key.decoding_key(), &validation)
            .map_err(|err| {
                tracing::debug!(target: "identity.auth.jwt", error = %err, "Token decode failed");
                match err.kind() {
                    ErrorKind::Json(_) | ErrorKind::Base64(_) | ErrorKind::Utf8(_) => {
                        VerificationError::MalformedToken
                    }
                    _ => VerificationError::InvalidSignature,
                }
            })?;

        let identity = self.validate_claims(token_data.claims, Utc::now())?;
        tracing::debug!(target: "identity.auth.jwt", "Token validated successfully");
        Ok(identity)
    }

    /// Deterministic claim validation against an explicit `now`.
    ///
    /// Split out from [`Self::verify`] so boundary conditions can be
    /// unit-tested without wall-clock dependence.
    fn validate_claims(
        &self,
        claims: CognitoClaims,
        now: DateTime<Utc>,
    ) -> Result<VerifiedIdentity, VerificationError> {
        if claims.iss.as_deref() != Some(self.issuer.as_str()) {
            tracing::debug!(target: "identity.auth.jwt", issuer = ?claims.iss, "Token issuer mismatch");
            return Err(VerificationError::InvalidIssuer);
        }

        if !claims.aud.iter().any(|aud| aud == &self.audience) {
            tracing::debug!(target: "identity.auth.jwt", "Configured audience absent from token");
            return Err(VerificationError::InvalidAudience);
        }

        let token_use = claims
            .token_use
            .as_deref()
            .and_then(TokenUse::parse)
            .filter(|use_| self.accepted_token_uses.contains(use_))
            .ok_or_else(|| {
                tracing::debug!(target: "identity.auth.jwt", token_use = ?claims.token_use, "Token use not accepted");
                VerificationError::InvalidTokenUse
            })?;

        // Both timestamp checks are mandatory; a token without exp cannot
        // satisfy "strictly in the future"
        let exp = claims.exp.ok_or(VerificationError::ExpiredToken)?;
        if exp <= now.timestamp() {
            tracing::debug!(target: "identity.auth.jwt", exp = exp, "Token expired");
            return Err(VerificationError::ExpiredToken);
        }

        if let Some(nbf) = claims.nbf {
            if nbf > now.timestamp() {
                tracing::debug!(target: "identity.auth.jwt", nbf = nbf, "Token not yet valid");
                return Err(VerificationError::TokenNotYetValid);
            }
        }

        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or(VerificationError::MalformedToken)?;
        let issued_at = claims.iat.and_then(|iat| Utc.timestamp_opt(iat, 0).single());
        let not_before = claims.nbf.and_then(|nbf| Utc.timestamp_opt(nbf, 0).single());

        let username = claims
            .username
            .clone()
            .unwrap_or_else(|| claims.sub.clone());

        Ok(VerifiedIdentity {
            subject: claims.sub,
            username,
            groups: claims.groups.into_iter().collect(),
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
            issued_at,
            expires_at,
            not_before,
            token_use,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    const NOW: i64 = 1_700_000_000;

    fn test_verifier() -> TokenVerifier {
        let vars = HashMap::from([
            ("AWS_REGION".to_string(), "us-east-1".to_string()),
            (
                "COGNITO_USER_POOL_ID".to_string(),
                "us-east-1_TestPool".to_string(),
            ),
            (
                "COGNITO_AUDIENCE".to_string(),
                "test-app-client".to_string(),
            ),
        ]);
        let config = Config::from_vars(&vars).expect("test config");
        let cache = Arc::new(JwksCache::new(
            config.jwks_url.clone(),
            Duration::from_secs(86_400),
            Duration::from_secs(10),
        ));
        TokenVerifier::new(&config, cache)
    }

    fn base_claims() -> serde_json::Value {
        serde_json::json!({
            "sub": "user-42",
            "iss": "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_TestPool",
            "aud": "test-app-client",
            "exp": NOW + 3600,
            "iat": NOW - 60,
            "token_use": "access",
            "cognito:username": "alice",
            "cognito:groups": ["user-group"]
        })
    }

    fn claims_from(value: serde_json::Value) -> CognitoClaims {
        serde_json::from_value(value).expect("claims json")
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(NOW, 0).single().unwrap()
    }

    #[test]
    fn test_valid_claims_produce_identity() {
        let verifier = test_verifier();
        let identity = verifier
            .validate_claims(claims_from(base_claims()), now())
            .expect("claims should validate");

        assert_eq!(identity.subject, "user-42");
        assert_eq!(identity.username, "alice");
        assert!(identity.has_group("user-group"));
        assert_eq!(identity.token_use, TokenUse::Access);
        assert_eq!(identity.expires_at.timestamp(), NOW + 3600);
        assert_eq!(identity.audience, "test-app-client");
    }

    #[test]
    fn test_username_falls_back_to_subject() {
        let verifier = test_verifier();
        let mut claims = base_claims();
        claims.as_object_mut().unwrap().remove("cognito:username");

        let identity = verifier
            .validate_claims(claims_from(claims), now())
            .unwrap();
        assert_eq!(identity.username, "user-42");
    }

    #[test]
    fn test_absent_groups_claim_is_empty_set() {
        let verifier = test_verifier();
        let mut claims = base_claims();
        claims.as_object_mut().unwrap().remove("cognito:groups");

        let identity = verifier
            .validate_claims(claims_from(claims), now())
            .unwrap();
        assert!(identity.groups.is_empty());
    }

    #[test]
    fn test_rejects_issuer_mismatch() {
        let verifier = test_verifier();
        let mut claims = base_claims();
        claims["iss"] = serde_json::json!("https://evil.example.com/pool");

        let result = verifier.validate_claims(claims_from(claims), now());
        assert!(matches!(result, Err(VerificationError::InvalidIssuer)));
    }

    #[test]
    fn test_rejects_missing_issuer() {
        let verifier = test_verifier();
        let mut claims = base_claims();
        claims.as_object_mut().unwrap().remove("iss");

        let result = verifier.validate_claims(claims_from(claims), now());
        assert!(matches!(result, Err(VerificationError::InvalidIssuer)));
    }

    #[test]
    fn test_rejects_audience_mismatch() {
        let verifier = test_verifier();
        let mut claims = base_claims();
        claims["aud"] = serde_json::json!("other-client");

        let result = verifier.validate_claims(claims_from(claims), now());
        assert!(matches!(result, Err(VerificationError::InvalidAudience)));
    }

    #[test]
    fn test_rejects_missing_audience() {
        let verifier = test_verifier();
        let mut claims = base_claims();
        claims.as_object_mut().unwrap().remove("aud");

        let result = verifier.validate_claims(claims_from(claims), now());
        assert!(matches!(result, Err(VerificationError::InvalidAudience)));
    }

    #[test]
    fn test_accepts_configured_audience_in_list() {
        let verifier = test_verifier();
        let mut claims = base_claims();
        claims["aud"] = serde_json::json!(["other-client", "test-app-client"]);

        assert!(verifier.validate_claims(claims_from(claims), now()).is_ok());
    }

    #[test]
    fn test_rejects_unknown_token_use() {
        let verifier = test_verifier();
        let mut claims = base_claims();
        claims["token_use"] = serde_json::json!("refresh");

        let result = verifier.validate_claims(claims_from(claims), now());
        assert!(matches!(result, Err(VerificationError::InvalidTokenUse)));
    }

    #[test]
    fn test_rejects_missing_token_use() {
        let verifier = test_verifier();
        let mut claims = base_claims();
        claims.as_object_mut().unwrap().remove("token_use");

        let result = verifier.validate_claims(claims_from(claims), now());
        assert!(matches!(result, Err(VerificationError::InvalidTokenUse)));
    }

    #[test]
    fn test_accepts_id_token_use_by_default() {
        let verifier = test_verifier();
        let mut claims = base_claims();
        claims["token_use"] = serde_json::json!("id");

        let identity = verifier
            .validate_claims(claims_from(claims), now())
            .unwrap();
        assert_eq!(identity.token_use, TokenUse::Id);
    }

    #[test]
    fn test_rejects_expired_token() {
        let verifier = test_verifier();
        let mut claims = base_claims();
        claims["exp"] = serde_json::json!(NOW - 1);

        let result = verifier.validate_claims(claims_from(claims), now());
        assert!(matches!(result, Err(VerificationError::ExpiredToken)));
    }

    #[test]
    fn test_rejects_exp_exactly_now() {
        // exp must be strictly after now
        let verifier = test_verifier();
        let mut claims = base_claims();
        claims["exp"] = serde_json::json!(NOW);

        let result = verifier.validate_claims(claims_from(claims), now());
        assert!(matches!(result, Err(VerificationError::ExpiredToken)));
    }

    #[test]
    fn test_rejects_missing_exp() {
        let verifier = test_verifier();
        let mut claims = base_claims();
        claims.as_object_mut().unwrap().remove("exp");

        let result = verifier.validate_claims(claims_from(claims), now());
        assert!(matches!(result, Err(VerificationError::ExpiredToken)));
    }

    #[test]
    fn test_rejects_future_nbf() {
        let verifier = test_verifier();
        let mut claims = base_claims();
        claims["nbf"] = serde_json::json!(NOW + 60);

        let result = verifier.validate_claims(claims_from(claims), now());
        assert!(matches!(result, Err(VerificationError::TokenNotYetValid)));
    }

    #[test]
    fn test_accepts_nbf_exactly_now() {
        // nbf may equal now; only a strictly-future nbf is invalid
        let verifier = test_verifier();
        let mut claims = base_claims();
        claims["nbf"] = serde_json::json!(NOW);

        assert!(verifier.validate_claims(claims_from(claims), now()).is_ok());
    }

    #[test]
    fn test_claim_gate_order_issuer_before_expiry() {
        // An expired token with a wrong issuer reports the issuer first
        let verifier = test_verifier();
        let mut claims = base_claims();
        claims["iss"] = serde_json::json!("https://evil.example.com/pool");
        claims["exp"] = serde_json::json!(NOW - 1);

        let result = verifier.validate_claims(claims_from(claims), now());
        assert!(matches!(result, Err(VerificationError::InvalidIssuer)));
    }
}
