//! JWKS cache for public keys published by the identity provider.
//!
//! Holds the most recently fetched key set and serves per-`kid` lookups
//! from memory. The set is refreshed when its age passes the configured
//! interval (default 24 hours, independent of the wire-level HTTP cache
//! headers).
//!
//! # Security
//!
//! - Keys are cached to keep verification off the network on the hot path
//! - The key set is replaced atomically on refresh; readers see either the
//!   old set or the new one, never a partial update
//! - A resolved key never outlives the set it was decoded from
//! - HTTPS should be used in production (enforced by deployment config)

use crate::auth::keys::{resolve_rsa_key, JwkSet, ResolvedKey};
use crate::config::Config;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Errors from key resolution.
///
/// `NotFound` is the common unknown/rotated-key case and is kept distinct
/// from transport-level fetch failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyResolveError {
    /// Key ID absent from the (possibly just-refreshed) key set.
    #[error("signing key '{0}' not present in the key set")]
    NotFound(String),

    /// The key document could not be fetched or parsed.
    #[error("key set fetch failed: {0}")]
    Fetch(String),
}

/// One fetched key set: decoded keys indexed by `kid`, plus its fetch time.
struct KeySet {
    keys: HashMap<String, Arc<ResolvedKey>>,
    fetched_at: Instant,
}

impl KeySet {
    fn is_fresh(&self, refresh_interval: Duration) -> bool {
        self.fetched_at.elapsed() < refresh_interval
    }
}

/// Shared cache over a single key-set slot.
///
/// Constructed once with configuration and handed by `Arc` to every
/// consumer; there is no process-wide singleton. Reads of the current set
/// go through a read lock and never block each other; the refresh-and-swap
/// is serialized through a separate mutex so concurrent resolves trigger
/// at most one in-flight fetch.
pub struct JwksCache {
    /// URL of the provider's key document.
    jwks_url: String,

    /// HTTP client with the bounded fetch timeout.
    http_client: reqwest::Client,

    /// The current key set; `None` until the first successful fetch.
    current: RwLock<Option<Arc<KeySet>>>,

    /// Serializes refreshes (single in-flight fetch per cache instance).
    refresh_lock: Mutex<()>,

    /// Age at which the key set is considered stale.
    refresh_interval: Duration,
}

impl JwksCache {
    /// Create a new cache.
    ///
    /// # Arguments
    ///
    /// * `jwks_url` - URL of the provider's key document
    /// * `refresh_interval` - age at which the cached set is refreshed
    /// * `fetch_timeout` - per-fetch timeout, distinct from any request
    ///   deadline
    #[must_use]
    pub fn new(jwks_url: String, refresh_interval: Duration, fetch_timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "identity.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            refresh_interval,
        }
    }

    /// Create a cache from configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.jwks_url.clone(),
            config.refresh_interval,
            config.fetch_timeout,
        )
    }

    /// Resolve a signing key by `kid`.
    ///
    /// Serves from memory while the key set is fresh; triggers a fetch when
    /// the cache is cold or stale. A failed stale-refresh falls back to the
    /// previous set (availability over absolute freshness); a failed cold
    /// fetch is a hard error. An unknown `kid` against a fresh set is
    /// reported without a refetch, so rotated keys are picked up at the
    /// next interval boundary rather than via unknown-kid fetch storms.
    ///
    /// # Errors
    ///
    /// - `NotFound` - the key ID is absent from the current set
    /// - `Fetch` - the cache is cold and the key document is unreachable
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn resolve(&self, kid: &str) -> Result<Arc<ResolvedKey>, KeyResolveError> {
        {
            let current = self.current.read().await;
            if let Some(set) = current.as_ref() {
                if set.is_fresh(self.refresh_interval) {
                    return match set.keys.get(kid) {
                        Some(key) => {
                            tracing::debug!(target: "identity.auth.jwks", kid = %kid, "JWKS cache hit");
                            Ok(Arc::clone(key))
                        }
                        None => {
                            tracing::debug!(target: "identity.auth.jwks", kid = %kid, "Key not found in fresh JWKS cache");
                            Err(KeyResolveError::NotFound(kid.to_string()))
                        }
                    };
                }
            }
        }

        // Cold or stale; refresh (or ride a refresh another caller finished)
        let set = self.refresh().await?;

        match set.keys.get(kid) {
            Some(key) => Ok(Arc::clone(key)),
            None => {
                tracing::warn!(target: "identity.auth.jwks", kid = %kid, "Key not found in JWKS after refresh");
                Err(KeyResolveError::NotFound(kid.to_string()))
            }
        }
    }

    /// Refresh the key set, returning whichever set should serve the caller.
    ///
    /// Holds the refresh mutex for the duration of the fetch; readers of
    /// the still-current set proceed unblocked until the swap.
    async fn refresh(&self) -> Result<Arc<KeySet>, KeyResolveError> {
        let _guard = self.refresh_lock.lock().await;

        // Another caller may have completed the refresh while we waited
        {
            let current = self.current.read().await;
            if let Some(set) = current.as_ref() {
                if set.is_fresh(self.refresh_interval) {
                    return Ok(Arc::clone(set));
                }
            }
        }

        match self.fetch_key_set().await {
            Ok(new_set) => {
                let new_set = Arc::new(new_set);
                let mut current = self.current.write().await;
                *current = Some(Arc::clone(&new_set));
                Ok(new_set)
            }
            Err(err) => {
                // Soft-fail: a stale set beats no set; cold failure is hard
                let current = self.current.read().await;
                match current.as_ref() {
                    Some(previous) => {
                        tracing::warn!(
                            target: "identity.auth.jwks",
                            error = %err,
                            "JWKS refresh failed, serving previous key set"
                        );
                        Ok(Arc::clone(previous))
                    }
                    None => {
                        tracing::error!(
                            target: "identity.auth.jwks",
                            error = %err,
                            "JWKS fetch failed with no cached key set"
                        );
                        Err(err)
                    }
                }
            }
        }
    }

    /// Fetch and decode the full key document.
    ///
    /// Undecodable records are skipped, not fatal: a key document
    /// legitimately contains keys from multiple algorithms and purposes.
    async fn fetch_key_set(&self) -> Result<KeySet, KeyResolveError> {
        tracing::debug!(target: "identity.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| KeyResolveError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(KeyResolveError::Fetch(format!(
                "key document endpoint returned {}",
                response.status()
            )));
        }

        let document: JwkSet = response
            .json()
            .await
            .map_err(|e| KeyResolveError::Fetch(format!("invalid key document: {e}")))?;

        let total = document.keys.len();
        let mut keys = HashMap::new();
        for jwk in &document.keys {
            match resolve_rsa_key(jwk) {
                Ok(key) => {
                    keys.insert(jwk.kid.clone(), Arc::new(key));
                }
                Err(err) => {
                    tracing::debug!(
                        target: "identity.auth.jwks",
                        kid = %jwk.kid,
                        error = %err,
                        "Skipping undecodable JWKS record"
                    );
                }
            }
        }

        tracing::info!(
            target: "identity.auth.jwks",
            key_count = keys.len(),
            record_count = total,
            "JWKS cache refreshed"
        );

        Ok(KeySet {
            keys,
            fetched_at: Instant::now(),
        })
    }
}
