//! Identity core configuration.
//!
//! Configuration is loaded from environment variables. The issuer and JWKS
//! URL are derived from the Cognito region and user-pool ID unless explicit
//! overrides are provided (useful for tests pointing at a mock endpoint).

use crate::auth::claims::TokenUse;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default group granted unconditional access.
pub const DEFAULT_ADMIN_GROUP: &str = "admin-group";

/// Default key-set refresh interval in seconds (24 hours).
///
/// Independent of the HTTP cache headers on the key document; Cognito rotates
/// signing keys rarely, and an unknown `kid` is reported without a refetch to
/// avoid fetch storms.
pub const DEFAULT_REFRESH_INTERVAL_SECONDS: u64 = 86_400;

/// Default timeout for a single key-document fetch in seconds.
///
/// Bounded separately from any request deadline so a slow provider cannot
/// hold request handlers indefinitely.
pub const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Identity core configuration.
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// AWS region hosting the Cognito user pool (e.g., "us-east-1").
    pub region: String,

    /// Cognito user-pool identifier (e.g., "us-east-1_AbCdEfGhI").
    pub user_pool_id: String,

    /// Expected `iss` claim. Derived from region + pool unless overridden.
    pub issuer: String,

    /// Key-document endpoint. Derived from the issuer unless overridden.
    pub jwks_url: String,

    /// Expected audience (the Cognito app client ID).
    pub audience: String,

    /// Group whose members bypass role and ownership checks.
    pub admin_group: String,

    /// How long a fetched key set is served before a refresh is attempted.
    pub refresh_interval: Duration,

    /// Timeout for a single key-document fetch.
    pub fetch_timeout: Duration,

    /// `token_use` values accepted by the verifier.
    pub accepted_token_uses: Vec<TokenUse>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid refresh interval configuration: {0}")]
    InvalidRefreshInterval(String),

    #[error("Invalid fetch timeout configuration: {0}")]
    InvalidFetchTimeout(String),

    #[error("Invalid accepted token use configuration: {0}")]
    InvalidTokenUse(String),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value
    /// fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value
    /// fails validation.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let region = vars
            .get("AWS_REGION")
            .ok_or_else(|| ConfigError::MissingEnvVar("AWS_REGION".to_string()))?
            .clone();

        let user_pool_id = vars
            .get("COGNITO_USER_POOL_ID")
            .ok_or_else(|| ConfigError::MissingEnvVar("COGNITO_USER_POOL_ID".to_string()))?
            .clone();

        let issuer = vars.get("COGNITO_ISSUER").cloned().unwrap_or_else(|| {
            format!("https://cognito-idp.{region}.amazonaws.com/{user_pool_id}")
        });

        let jwks_url = vars
            .get("COGNITO_JWKS_URL")
            .cloned()
            .unwrap_or_else(|| format!("{issuer}/.well-known/jwks.json"));

        let audience = vars
            .get("COGNITO_AUDIENCE")
            .ok_or_else(|| ConfigError::MissingEnvVar("COGNITO_AUDIENCE".to_string()))?
            .clone();

        let admin_group = vars
            .get("AUTH_ADMIN_GROUP")
            .cloned()
            .unwrap_or_else(|| DEFAULT_ADMIN_GROUP.to_string());

        let refresh_interval = if let Some(value_str) = vars.get("JWKS_REFRESH_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidRefreshInterval(format!(
                    "JWKS_REFRESH_SECONDS must be a valid positive integer, got '{value_str}': {e}"
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidRefreshInterval(
                    "JWKS_REFRESH_SECONDS must be greater than 0".to_string(),
                ));
            }

            Duration::from_secs(value)
        } else {
            Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECONDS)
        };

        let fetch_timeout = if let Some(value_str) = vars.get("JWKS_FETCH_TIMEOUT_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidFetchTimeout(format!(
                    "JWKS_FETCH_TIMEOUT_SECONDS must be a valid positive integer, got '{value_str}': {e}"
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidFetchTimeout(
                    "JWKS_FETCH_TIMEOUT_SECONDS must be greater than 0".to_string(),
                ));
            }

            Duration::from_secs(value)
        } else {
            Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECONDS)
        };

        let accepted_token_uses =
            if let Some(value_str) = vars.get("AUTH_ACCEPTED_TOKEN_USES") {
                let uses = value_str
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        TokenUse::parse(s).ok_or_else(|| {
                            ConfigError::InvalidTokenUse(format!(
                                "unknown token use '{s}', expected 'access' or 'id'"
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                if uses.is_empty() {
                    return Err(ConfigError::InvalidTokenUse(
                        "AUTH_ACCEPTED_TOKEN_USES must name at least one token use".to_string(),
                    ));
                }

                uses
            } else {
                vec![TokenUse::Access, TokenUse::Id]
            };

        Ok(Config {
            region,
            user_pool_id,
            issuer,
            jwks_url,
            audience,
            admin_group,
            refresh_interval,
            fetch_timeout,
            accepted_token_uses,
        })
    }
}
