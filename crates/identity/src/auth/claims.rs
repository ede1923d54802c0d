//! Token claims and the verified identity they produce.
//!
//! [`CognitoClaims`] is the wire shape of a Cognito token payload: the
//! validated fields are named and statically typed, while provider-specific
//! extensions land in the `extra` map. [`VerifiedIdentity`] is constructed
//! only by the verifier after every gate has passed; it lives for one
//! request and is never persisted.
//!
//! Identity-bearing fields (`sub`, username, email) are redacted in Debug
//! output to prevent exposure in logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// The Cognito `token_use` claim values accepted by this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenUse {
    /// An access token (API authorization).
    Access,
    /// An ID token (user identity attributes).
    Id,
}

impl TokenUse {
    /// Parse a wire value; unknown values yield `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "access" => Some(TokenUse::Access),
            "id" => Some(TokenUse::Id),
            _ => None,
        }
    }

    /// The wire spelling of this token use.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TokenUse::Access => "access",
            TokenUse::Id => "id",
        }
    }
}

impl fmt::Display for TokenUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token payload as deserialized from the wire, prior to claim validation.
///
/// Every timestamp is left as raw epoch seconds here; the verifier owns the
/// comparisons and their error taxonomy. `aud` may be single- or
/// multi-valued on the wire and is normalized to a list.
#[derive(Clone, Deserialize)]
pub struct CognitoClaims {
    /// Subject (user identifier) - redacted in Debug output.
    pub sub: String,

    /// Issuer URL.
    #[serde(default)]
    pub iss: Option<String>,

    /// Audience list (single- or multi-valued on the wire).
    #[serde(default, deserialize_with = "deserialize_audience")]
    pub aud: Vec<String>,

    /// Expiration timestamp (Unix epoch seconds).
    #[serde(default)]
    pub exp: Option<i64>,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(default)]
    pub iat: Option<i64>,

    /// Not-before timestamp (Unix epoch seconds).
    #[serde(default)]
    pub nbf: Option<i64>,

    /// Cognito token use ("access" or "id"); validated by the verifier.
    #[serde(default)]
    pub token_use: Option<String>,

    /// Username - redacted in Debug output. Absent on some access tokens.
    #[serde(default, rename = "cognito:username")]
    pub username: Option<String>,

    /// Group memberships; absent claim means no groups, not an error.
    #[serde(default, rename = "cognito:groups")]
    pub groups: Vec<String>,

    /// Email address - redacted in Debug output.
    #[serde(default)]
    pub email: Option<String>,

    /// Whether the email address has been verified by the provider.
    #[serde(default)]
    pub email_verified: Option<bool>,

    /// Provider-specific extension claims not modeled above.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

fn deserialize_audience<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Audience {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<Audience>::deserialize(deserializer)? {
        Some(Audience::One(value)) => vec![value],
        Some(Audience::Many(values)) => values,
        None => Vec::new(),
    })
}

impl fmt::Debug for CognitoClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CognitoClaims")
            .field("sub", &"[REDACTED]")
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("nbf", &self.nbf)
            .field("token_use", &self.token_use)
            .field("username", &"[REDACTED]")
            .field("groups", &self.groups)
            .field("email", &"[REDACTED]")
            .field("email_verified", &self.email_verified)
            .finish_non_exhaustive()
    }
}

/// The output of successful verification.
///
/// Constructed only by the verifier; the group set is immutable once parsed
/// from the token and authorization logic never elevates it.
#[derive(Clone)]
pub struct VerifiedIdentity {
    /// Subject (user identifier) - redacted in Debug output.
    pub subject: String,

    /// Username; falls back to the subject when the provider claim is
    /// absent so downstream code always has a stable handle.
    pub username: String,

    /// Group memberships.
    pub groups: HashSet<String>,

    /// Issuer the token was validated against.
    pub issuer: String,

    /// Audience the token was validated against.
    pub audience: String,

    /// When the token was issued.
    pub issued_at: Option<DateTime<Utc>>,

    /// When the token expires.
    pub expires_at: DateTime<Utc>,

    /// When the token becomes valid.
    pub not_before: Option<DateTime<Utc>>,

    /// Which kind of token this identity came from.
    pub token_use: TokenUse,
}

impl VerifiedIdentity {
    /// Check membership in a group.
    #[must_use]
    pub fn has_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}

impl fmt::Debug for VerifiedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifiedIdentity")
            .field("subject", &"[REDACTED]")
            .field("username", &"[REDACTED]")
            .field("groups", &self.groups)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("not_before", &self.not_before)
            .field("token_use", &self.token_use)
            .finish()
    }
}
