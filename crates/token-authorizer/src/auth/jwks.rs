//! Key set resolver: fetches an identity provider's JSON Web Key Set.
//!
//! Providers publish their current signing keys at a
//! `/.well-known/jwks.json` style endpoint. [`HttpKeySetSource`] performs one
//! GET per call and parses the document into a [`KeySet`]; wrap it in
//! [`CachingKeySetSource`](crate::auth::cache::CachingKeySetSource) to avoid
//! refetching on every token.
//!
//! # Security
//!
//! - HTTPS should be used in production (enforced by deployment config)
//! - A document with no keys is an error, never an empty trust set
//! - No retries here; transient failures surface to the caller

use crate::errors::KeyResolutionError;
use crate::observability::metrics;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Default timeout for a single key set fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON Web Key from a JWKS document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA", "OKP" or "EC").
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: String,

    /// Algorithm the key is published for (e.g. "RS256").
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig" for signing).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// Curve name for OKP and EC keys.
    #[serde(default)]
    pub crv: Option<String>,

    /// OKP public key or EC x coordinate (base64url).
    #[serde(default)]
    pub x: Option<String>,

    /// EC y coordinate (base64url).
    #[serde(default)]
    pub y: Option<String>,
}

/// An ordered set of signing keys, in the order the provider published them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct KeySet {
    pub keys: Vec<Jwk>,
}

impl KeySet {
    /// Parse a JWKS document.
    ///
    /// # Errors
    ///
    /// `Malformed` if the body is not a JWKS document, `EmptyKeySet` if it
    /// lists no keys.
    pub fn from_slice(body: &[u8]) -> Result<Self, KeyResolutionError> {
        let key_set: KeySet = serde_json::from_slice(body)
            .map_err(|e| KeyResolutionError::Malformed(e.to_string()))?;

        if key_set.keys.is_empty() {
            return Err(KeyResolutionError::EmptyKeySet);
        }

        Ok(key_set)
    }

    /// Find the key with the given ID.
    ///
    /// Exact match; if the provider published duplicate IDs the first one wins.
    ///
    /// # Errors
    ///
    /// `KeyNotFound` when no key carries `kid`.
    pub fn lookup(&self, kid: &str) -> Result<&Jwk, KeyResolutionError> {
        self.keys
            .iter()
            .find(|key| key.kid == kid)
            .ok_or_else(|| KeyResolutionError::KeyNotFound {
                kid: kid.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Source of key sets, keyed by endpoint URL.
///
/// Implementations must be safe to call concurrently.
#[async_trait]
pub trait KeySetSource: Send + Sync {
    /// Return the key set published at `endpoint`.
    async fn fetch_key_set(&self, endpoint: &str) -> Result<Arc<KeySet>, KeyResolutionError>;

    /// Called when a token's `kid` is missing from the set just returned.
    ///
    /// Returns a newer key set if the source is willing to refetch, `None`
    /// otherwise. Sources without a cache have nothing newer to offer.
    async fn refetch_on_miss(
        &self,
        _endpoint: &str,
    ) -> Result<Option<Arc<KeySet>>, KeyResolutionError> {
        Ok(None)
    }
}

/// Fetches key sets over HTTP, one request per call.
#[derive(Debug, Clone)]
pub struct HttpKeySetSource {
    http_client: reqwest::Client,
}

impl HttpKeySetSource {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    /// Create a source whose requests time out after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "authorizer.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self { http_client }
    }

    async fn fetch(&self, endpoint: &str) -> Result<KeySet, KeyResolutionError> {
        let response = self.http_client.get(endpoint).send().await.map_err(|e| {
            tracing::error!(target: "authorizer.jwks", error = %e, "Failed to fetch JWKS");
            KeyResolutionError::Transport(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(
                target: "authorizer.jwks",
                status = %status,
                "JWKS endpoint returned error"
            );
            return Err(KeyResolutionError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| {
            tracing::error!(target: "authorizer.jwks", error = %e, "Failed to read JWKS response body");
            KeyResolutionError::Transport(e.to_string())
        })?;

        KeySet::from_slice(&body).inspect_err(|e| {
            tracing::error!(target: "authorizer.jwks", error = %e, "Failed to parse JWKS response");
        })
    }
}

impl Default for HttpKeySetSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    #[instrument(skip(self), fields(endpoint = %endpoint))]
    async fn fetch_key_set(&self, endpoint: &str) -> Result<Arc<KeySet>, KeyResolutionError> {
        tracing::debug!(target: "authorizer.jwks", "Fetching JWKS");

        let start = Instant::now();
        let result = self.fetch(endpoint).await;
        let status = if result.is_ok() { "success" } else { "error" };
        metrics::record_jwks_fetch(status, start.elapsed());

        let key_set = result?;
        tracing::debug!(target: "authorizer.jwks", key_count = key_set.len(), "JWKS fetched");
        Ok(Arc::new(key_set))
    }
}
