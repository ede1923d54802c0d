//! Bearer-token verification.
//!
//! The pipeline: [`crate::auth::verifier::TokenVerifier`] inspects the token
//! header, resolves the signing key through [`crate::auth::jwks::JwksCache`]
//! (reconstructed from JWK wire records by [`crate::auth::keys`]), checks the
//! RSA signature, and validates the claims into a
//! [`crate::auth::claims::VerifiedIdentity`].

pub mod claims;
pub mod jwks;
pub mod keys;
pub mod verifier;

pub use claims::{TokenUse, VerifiedIdentity};
pub use jwks::{JwksCache, KeyResolveError};
pub use verifier::{TokenVerifier, VerificationError};
