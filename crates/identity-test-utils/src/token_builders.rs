//! Builder patterns for test data construction.
//!
//! Provides a fluent API for creating Cognito-shaped test tokens signed
//! with the fixture RSA key.

use crate::crypto_fixtures::{test_encoding_key, TEST_KID};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

/// Issuer used by test tokens and test configuration.
pub const TEST_ISSUER: &str =
    "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_TestPool";

/// Audience (app client ID) used by test tokens and test configuration.
pub const TEST_AUDIENCE: &str = "test-app-client";

/// Builder for Cognito-shaped test tokens.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_subject("42")
///     .with_username("alice")
///     .with_groups(&["user-group"])
///     .expires_in(3600)
///     .sign();
/// ```
pub struct TestTokenBuilder {
    sub: String,
    username: Option<String>,
    groups: Option<Vec<String>>,
    token_use: Option<String>,
    iss: String,
    aud: Value,
    exp: i64,
    iat: i64,
    nbf: Option<i64>,
    kid: Option<String>,
}

impl TestTokenBuilder {
    /// Create a builder with defaults: a valid access token for the test
    /// issuer and audience, expiring in an hour, signed under [`TEST_KID`].
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            sub: "test-subject".to_string(),
            username: None,
            groups: None,
            token_use: Some("access".to_string()),
            iss: TEST_ISSUER.to_string(),
            aud: Value::String(TEST_AUDIENCE.to_string()),
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
            nbf: None,
            kid: Some(TEST_KID.to_string()),
        }
    }

    /// Set the subject.
    #[must_use]
    pub fn for_subject(mut self, subject: &str) -> Self {
        self.sub = subject.to_string();
        self
    }

    /// Set the `cognito:username` claim.
    #[must_use]
    pub fn with_username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    /// Set the `cognito:groups` claim.
    #[must_use]
    pub fn with_groups(mut self, groups: &[&str]) -> Self {
        self.groups = Some(groups.iter().map(ToString::to_string).collect());
        self
    }

    /// Set the `token_use` claim; `None` omits it.
    #[must_use]
    pub fn with_token_use(mut self, token_use: Option<&str>) -> Self {
        self.token_use = token_use.map(ToString::to_string);
        self
    }

    /// Set the issuer.
    #[must_use]
    pub fn issued_by(mut self, issuer: &str) -> Self {
        self.iss = issuer.to_string();
        self
    }

    /// Set a single-valued audience.
    #[must_use]
    pub fn for_audience(mut self, audience: &str) -> Self {
        self.aud = Value::String(audience.to_string());
        self
    }

    /// Set a multi-valued audience.
    #[must_use]
    pub fn for_audiences(mut self, audiences: &[&str]) -> Self {
        self.aud = json!(audiences);
        self
    }

    /// Set expiration in seconds from now (negative for already expired).
    #[must_use]
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Set `nbf` in seconds from now (positive for not-yet-valid).
    #[must_use]
    pub fn not_before_in(mut self, seconds: i64) -> Self {
        self.nbf = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    /// Set the header `kid`.
    #[must_use]
    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid = Some(kid.to_string());
        self
    }

    /// Omit the header `kid`.
    #[must_use]
    pub fn without_kid(mut self) -> Self {
        self.kid = None;
        self
    }

    /// Build the claims as a JSON value.
    #[must_use]
    pub fn build_claims(&self) -> Value {
        let mut claims = Map::new();
        claims.insert("sub".to_string(), json!(self.sub));
        claims.insert("iss".to_string(), json!(self.iss));
        claims.insert("aud".to_string(), self.aud.clone());
        claims.insert("exp".to_string(), json!(self.exp));
        claims.insert("iat".to_string(), json!(self.iat));
        if let Some(nbf) = self.nbf {
            claims.insert("nbf".to_string(), json!(nbf));
        }
        if let Some(token_use) = &self.token_use {
            claims.insert("token_use".to_string(), json!(token_use));
        }
        if let Some(username) = &self.username {
            claims.insert("cognito:username".to_string(), json!(username));
        }
        if let Some(groups) = &self.groups {
            claims.insert("cognito:groups".to_string(), json!(groups));
        }
        Value::Object(claims)
    }

    /// Sign with RS256 and the fixture RSA key.
    ///
    /// # Panics
    ///
    /// Panics if signing fails, which would be a fixture defect.
    #[must_use]
    pub fn sign(self) -> String {
        self.sign_with(Algorithm::RS256, &test_encoding_key())
    }

    /// Sign with HS256 and an arbitrary secret.
    ///
    /// Produces the algorithm-substitution attack shape: a structurally
    /// valid token whose asserted family the verifier must reject before
    /// key resolution.
    ///
    /// # Panics
    ///
    /// Panics if signing fails.
    #[must_use]
    pub fn sign_hs256(self) -> String {
        let key = EncodingKey::from_secret(b"attacker-chosen-secret");
        self.sign_with(Algorithm::HS256, &key)
    }

    fn sign_with(self, algorithm: Algorithm, key: &EncodingKey) -> String {
        let claims = self.build_claims();
        let mut header = Header::new(algorithm);
        header.typ = Some("JWT".to_string());
        header.kid = self.kid;

        encode(&header, &claims, key).expect("failed to sign test token")
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
