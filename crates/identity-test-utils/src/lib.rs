//! # Identity Test Utilities
//!
//! Shared test utilities for the Timecard identity core.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (a fixed RSA keypair with its JWK form)
//! - Test data builders (`TestTokenBuilder` for Cognito-shaped tokens)
//! - A mock JWKS endpoint harness (`MockJwks` over wiremock)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use identity_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let jwks = MockJwks::start().await;
//!     jwks.serve_keys(test_jwks_document(&[TEST_KID])).await;
//!
//!     let token = TestTokenBuilder::new()
//!         .for_subject("42")
//!         .with_groups(&["user-group"])
//!         .sign();
//!     // ... point the verifier's COGNITO_JWKS_URL at jwks.url()
//! }
//! ```

pub mod crypto_fixtures;
pub mod jwks_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use jwks_harness::*;
pub use token_builders::*;
