//! JWK wire records and RSA public-key reconstruction.
//!
//! Cognito publishes signing keys as JWK records carrying the RSA modulus
//! and public exponent base64url-encoded. This module validates a record
//! and rebuilds a usable [`jsonwebtoken::DecodingKey`] from it.

use common::jwt::{decode_key_component, is_rs_family};
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// JSON Web Key from the provider's key document.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key ID - used to select the correct key for verification.
    pub kid: String,

    /// Key type (always "RSA" for Cognito user-pool keys).
    pub kty: String,

    /// Algorithm (should be in the RS family).
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig" for signing).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url encoded, big-endian, unpadded).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url encoded, big-endian, unpadded).
    #[serde(default)]
    pub e: Option<String>,
}

/// Key document returned by the provider's JWKS endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct JwkSet {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

/// Errors that can occur while reconstructing a public key from a JWK.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyDecodeError {
    /// Key type is not RSA.
    #[error("unsupported key type '{0}'")]
    UnsupportedKeyType(String),

    /// Algorithm is outside the accepted RSA family.
    #[error("unsupported algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    /// A required component (`n` or `e`) is absent.
    #[error("missing key component '{0}'")]
    MissingComponent(&'static str),

    /// A component is present but not decodable.
    #[error("invalid key component: {0}")]
    InvalidComponent(String),
}

/// A usable public key reconstructed from a JWK record.
///
/// Lives inside a key set owned by the JWKS cache; the cache replaces the
/// whole set atomically on refresh, so a `ResolvedKey` never outlives the
/// key set it was decoded from.
#[derive(Clone)]
pub struct ResolvedKey {
    /// Key ID this key was published under.
    pub kid: String,

    decoding_key: DecodingKey,
}

impl ResolvedKey {
    /// The verification key for `jsonwebtoken::decode`.
    #[must_use]
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

/// `DecodingKey` holds raw key material, keep it out of debug output.
impl fmt::Debug for ResolvedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedKey")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

/// Reconstruct an RSA public key from a JWK record.
///
/// A key document legitimately mixes keys of several types and purposes;
/// callers processing a batch skip records this function rejects and
/// continue with the rest.
///
/// # Errors
///
/// Returns `KeyDecodeError` when the record is not an RS-family RSA key or
/// its `n`/`e` components are absent or not valid unpadded base64url.
pub fn resolve_rsa_key(jwk: &Jwk) -> Result<ResolvedKey, KeyDecodeError> {
    if jwk.kty != "RSA" {
        return Err(KeyDecodeError::UnsupportedKeyType(jwk.kty.clone()));
    }

    if let Some(alg) = &jwk.alg {
        if !is_rs_family(alg) {
            return Err(KeyDecodeError::UnsupportedAlgorithm(alg.clone()));
        }
    }

    let n = jwk
        .n
        .as_deref()
        .ok_or(KeyDecodeError::MissingComponent("n"))?;
    let e = jwk
        .e
        .as_deref()
        .ok_or(KeyDecodeError::MissingComponent("e"))?;

    // Validate the base64url encoding up front so a malformed component is
    // reported with its own reason rather than as an opaque library error
    decode_key_component(n)
        .map_err(|err| KeyDecodeError::InvalidComponent(format!("modulus: {err}")))?;
    decode_key_component(e)
        .map_err(|err| KeyDecodeError::InvalidComponent(format!("exponent: {err}")))?;

    let decoding_key = DecodingKey::from_rsa_components(n, e)
        .map_err(|err| KeyDecodeError::InvalidComponent(err.to_string()))?;

    Ok(ResolvedKey {
        kid: jwk.kid.clone(),
        decoding_key,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    // Modulus/exponent of the 2048-bit test fixture key pair; any valid
    // RSA components work here since only decoding is exercised
    const TEST_N: &str = "wsO5rqxMEmeSY-I35D6fQ8ZoYa1dPsur6OSf8I_GNSf5N46rBq94PwG9Bd_QpY1RJvEG87nGBcZwj7PDyxqGBtKXS0kY2Ln1GqTo_JXd6JT7lnhJCcLb92e5YplVC6TgQCh09glx0r5lCp7oz-HWVX0YcGlDnHm24NUIVGDhDYggB-Zl9XuTKc33sLuhnR3ASDBoNpsPTjo0FwBVxBA9szKM3Ajl0STJQbx9codjcMAB4sqgWLoGrt1mpRxfE2aXDyv9ZiZuykb24l0TYm5BBR_VZUUSJaRQimJt8g2uH1MXd-Tw3OtUOUVe16jiHGNE-jiA05T9Gknr3Aqqs291hw";
    const TEST_E: &str = "AQAB";

    fn rsa_jwk() -> Jwk {
        Jwk {
            kid: "test-key-01".to_string(),
            kty: "RSA".to_string(),
            alg: Some("RS256".to_string()),
            key_use: Some("sig".to_string()),
            n: Some(TEST_N.to_string()),
            e: Some(TEST_E.to_string()),
        }
    }

    #[test]
    fn test_resolve_valid_rsa_key() {
        let key = resolve_rsa_key(&rsa_jwk()).expect("fixture JWK should decode");
        assert_eq!(key.kid, "test-key-01");
    }

    #[test]
    fn test_resolve_accepts_missing_alg() {
        let mut jwk = rsa_jwk();
        jwk.alg = None;

        assert!(resolve_rsa_key(&jwk).is_ok());
    }

    #[test]
    fn test_resolve_rejects_non_rsa_key_type() {
        let mut jwk = rsa_jwk();
        jwk.kty = "OKP".to_string();

        let result = resolve_rsa_key(&jwk);
        assert!(matches!(
            result,
            Err(KeyDecodeError::UnsupportedKeyType(kty)) if kty == "OKP"
        ));
    }

    #[test]
    fn test_resolve_rejects_non_rs_algorithm() {
        let mut jwk = rsa_jwk();
        jwk.alg = Some("HS256".to_string());

        let result = resolve_rsa_key(&jwk);
        assert!(matches!(
            result,
            Err(KeyDecodeError::UnsupportedAlgorithm(alg)) if alg == "HS256"
        ));
    }

    #[test]
    fn test_resolve_rejects_missing_modulus() {
        let mut jwk = rsa_jwk();
        jwk.n = None;

        let result = resolve_rsa_key(&jwk);
        assert!(matches!(result, Err(KeyDecodeError::MissingComponent("n"))));
    }

    #[test]
    fn test_resolve_rejects_missing_exponent() {
        let mut jwk = rsa_jwk();
        jwk.e = None;

        let result = resolve_rsa_key(&jwk);
        assert!(matches!(result, Err(KeyDecodeError::MissingComponent("e"))));
    }

    #[test]
    fn test_resolve_rejects_malformed_modulus() {
        let mut jwk = rsa_jwk();
        jwk.n = Some("!!!not-base64url!!!".to_string());

        let result = resolve_rsa_key(&jwk);
        assert!(matches!(result, Err(KeyDecodeError::InvalidComponent(_))));
    }

    #[test]
    fn test_debug_omits_key_material() {
        let key = resolve_rsa_key(&rsa_jwk()).unwrap();
        let debug_str = format!("{key:?}");
        assert!(debug_str.contains("test-key-01"));
        assert!(!debug_str.contains(TEST_N));
    }

    #[test]
    fn test_jwk_set_deserialization() {
        let json = r#"{
            "keys": [
                {"kid": "key-1", "kty": "RSA", "alg": "RS256", "use": "sig", "n": "AQAB", "e": "AQAB"},
                {"kid": "key-2", "kty": "RSA"}
            ]
        }"#;

        let set: JwkSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.keys.len(), 2);
        assert_eq!(set.keys.first().unwrap().kid, "key-1");
        assert!(set.keys.get(1).unwrap().n.is_none());
    }
}
