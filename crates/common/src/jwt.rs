//! JWT utilities shared across Timecard components.
//!
//! This module provides the common primitives for bearer-token handling:
//! - Size limits for DoS prevention
//! - Header inspection (algorithm + key ID) without signature verification
//! - Base64url decoding of JWK key components (RSA `n`/`e`)
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only the RSA (RS256/RS384/RS512) algorithm family is accepted
//! - Generic error messages prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{inspect_header, is_rs_family, MAX_JWT_SIZE_BYTES};
//!
//! let header = inspect_header(token)?;
//! if !is_rs_family(&header.alg) {
//!     return Err("unexpected signing algorithm");
//! }
//! let kid = header.kid.ok_or("missing key id")?;
//! // Use kid to look up the public key from the JWKS
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// This limit prevents denial-of-service attacks via oversized tokens.
/// JWTs larger than this size are rejected BEFORE any parsing or cryptographic
/// operations.
///
/// # Rationale
///
/// - Typical Cognito tokens are 800-1200 bytes (header + claims + signature)
/// - 8KB allows for reasonable claim expansion while preventing abuse
/// - Checked BEFORE base64 decode and signature verification for efficiency
///
/// Per OWASP API Security Top 10 - API4:2023 (Unrestricted Resource Consumption)
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Signing algorithms accepted from the identity provider.
///
/// Cognito signs user-pool tokens with RSA keys. Tokens asserting any other
/// algorithm family are rejected up front, before key resolution, to prevent
/// algorithm-substitution attacks (`alg: none`, HMAC-with-public-key).
pub const RS_FAMILY: [&str; 3] = ["RS256", "RS384", "RS512"];

/// Check whether `alg` belongs to the accepted RSA family.
#[must_use]
pub fn is_rs_family(alg: &str) -> bool {
    RS_FAMILY.contains(&alg)
}

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while inspecting a token header.
///
/// Note: Error messages are intentionally generic to prevent information
/// leakage. Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtHeaderError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,
}

// =============================================================================
// Header Inspection
// =============================================================================

/// Algorithm and key ID asserted by a token header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    /// Signing algorithm asserted by the token (unverified).
    pub alg: String,

    /// Key ID naming which JWKS entry signed the token. `None` when the
    /// header carries no usable `kid` (absent, empty, or not a string);
    /// callers decide when a missing key ID becomes an error so the
    /// algorithm check can run first.
    pub kid: Option<String>,
}

/// Inspect a JWT header without verifying the signature.
///
/// Performs the size check, the three-segment structural check, and decodes
/// the header segment to extract `alg` and `kid`. The `kid` is used to look
/// up the correct signing key when multiple keys may be valid (e.g., during
/// key rotation); an unusable `kid` is reported as absent rather than as an
/// error here, because the signing-algorithm check must reject a token
/// before its key ID is ever considered.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing (denial-of-service prevention)
/// - This function does NOT validate the token signature
/// - The token MUST still be verified after fetching the key
/// - The `kid` value should only be used for key lookup in a trusted JWKS
///
/// # Errors
///
/// Returns `JwtHeaderError` variants:
/// - `TokenTooLarge` - Token exceeds size limit
/// - `MalformedToken` - Wrong segment count, bad base64, invalid JSON, or
///   missing `alg`
pub fn inspect_header(token: &str) -> Result<TokenHeader, JwtHeaderError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtHeaderError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        tracing::debug!(
            target: "common.jwt",
            parts = parts.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(JwtHeaderError::MalformedToken);
    }

    let header_part = parts.first().ok_or(JwtHeaderError::MalformedToken)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtHeaderError::MalformedToken
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtHeaderError::MalformedToken
    })?;

    let alg = header
        .get("alg")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtHeaderError::MalformedToken)?;

    // Extract kid as string, normalizing empty values to absent for
    // defense-in-depth
    let kid = header
        .get("kid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string);

    Ok(TokenHeader { alg, kid })
}

// =============================================================================
// Key Material
// =============================================================================

/// Decode a JWK key component (`n` or `e`) from base64url format.
///
/// JWK RSA components are base64url-encoded big-endian unsigned integers
/// without padding (RFC 7518 §6.3).
///
/// # Errors
///
/// Returns `base64::DecodeError` if the content is not valid unpadded
/// base64url.
pub fn decode_key_component(component: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(component)
}

// =============================================================================
// Tests
// =============================================================================
