//! Validation facade.
//!
//! The single entry point an authorization layer calls: token and key set
//! endpoint in, principal identifier or classified error out.

use crate::auth::cache::CachingKeySetSource;
use crate::auth::jwks::{HttpKeySetSource, KeySetSource};
use crate::auth::jwt::{TokenVerifier, VerificationPolicy};
use crate::auth::principal::{map_principal, PrincipalId};
use crate::config::ValidatorConfig;
use crate::errors::ValidationError;
use crate::observability::metrics;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Validates bearer tokens and maps them to principals.
///
/// Cheap to share behind an `Arc`; concurrent `validate` calls only contend
/// on the key set cache, if one is configured.
pub struct TokenValidator {
    verifier: TokenVerifier,
}

impl TokenValidator {
    /// Build a validator from configuration.
    ///
    /// Key sets are fetched over HTTP and cached per endpoint unless the
    /// configured TTL is zero, in which case every call fetches.
    pub fn new(config: &ValidatorConfig) -> Self {
        let http = HttpKeySetSource::with_timeout(config.jwks_fetch_timeout);

        let key_source: Arc<dyn KeySetSource> = if config.caching_enabled() {
            Arc::new(CachingKeySetSource::with_ttl(
                http,
                config.jwks_cache_ttl,
                config.jwks_min_refresh_interval,
            ))
        } else {
            Arc::new(http)
        };

        tracing::info!(
            target: "authorizer.validator",
            cache_ttl_secs = config.jwks_cache_ttl.as_secs(),
            algorithms = ?config.allowed_algorithms,
            "Token validator configured"
        );

        Self::with_key_source(key_source, config.policy())
    }

    /// Build a validator around an explicit key set source.
    pub fn with_key_source(key_source: Arc<dyn KeySetSource>, policy: VerificationPolicy) -> Self {
        Self {
            verifier: TokenVerifier::new(key_source, policy),
        }
    }

    pub fn policy(&self) -> &VerificationPolicy {
        self.verifier.policy()
    }

    /// Validate `token` against the key set at `endpoint`.
    ///
    /// # Errors
    ///
    /// - `InvalidToken` - the token is malformed, unknown, badly signed, or
    ///   its claims do not hold
    /// - `KeyResolution` - the key set could not be fetched or parsed
    #[instrument(skip_all, name = "authorizer.validate")]
    pub async fn validate(&self, token: &str, endpoint: &str) -> Result<PrincipalId, ValidationError> {
        let start = Instant::now();

        let result = self
            .verifier
            .verify(token, endpoint)
            .await
            .map(|parsed| map_principal(&parsed));

        match &result {
            Ok(_) => {
                tracing::debug!(target: "authorizer.validator", "Token accepted");
                metrics::record_token_validation("success", None, start.elapsed());
            }
            Err(e) => {
                tracing::debug!(
                    target: "authorizer.validator",
                    step = %e.step(),
                    error_type = e.error_type(),
                    cause = %e.diagnostic(),
                    "Token rejected"
                );
                metrics::record_token_validation("error", Some(e.error_type()), start.elapsed());
            }
        }

        result
    }
}

/// Validate a token with the default policy and no key set cache.
///
/// Fetches the key set once per call. Services validating more than the
/// occasional token should hold a [`TokenValidator`] instead.
pub async fn validate(token: &str, endpoint: &str) -> Result<PrincipalId, ValidationError> {
    TokenValidator::with_key_source(
        Arc::new(HttpKeySetSource::new()),
        VerificationPolicy::default(),
    )
    .validate(token, endpoint)
    .await
}
