//! Identity core for the Timecard API.
//!
//! Verifies bearer tokens issued by an AWS Cognito user pool and makes
//! role/ownership authorization decisions on top of the verified identity.
//! The CRUD layer consumes this crate through a narrow interface: the
//! [`middleware::auth::authenticate`] middleware attaches a
//! [`auth::claims::VerifiedIdentity`] to each request, and handlers call
//! [`authz::AccessPolicy::authorize`] with the operation's required groups
//! and, where relevant, the resource's owner identifier.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Token verification: key material, JWKS cache, claims, verifier
pub mod auth;

/// Pure allow/deny decisions over a verified identity
pub mod authz;

/// Environment-driven configuration
pub mod config;

/// HTTP-facing error type with status-code mapping
pub mod errors;

/// Axum middleware for bearer extraction and group guards
pub mod middleware;
