//! Axum middleware for the inbound bearer surface.

pub mod auth;

pub use auth::{authenticate, require_any_group, AuthState, IdentityExt};
