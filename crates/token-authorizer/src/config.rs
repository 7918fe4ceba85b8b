//! Validator configuration.
//!
//! Configuration is loaded from environment variables by the host service.
//! Nothing in this crate reads the environment on its own; the validator
//! only sees the [`ValidatorConfig`] it is handed.

use crate::auth::jwt::VerificationPolicy;
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use jsonwebtoken::Algorithm;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default key set cache TTL in seconds.
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 300;

/// Default minimum interval between refetches triggered by an unknown `kid`.
pub const DEFAULT_JWKS_MIN_REFRESH_INTERVAL_SECONDS: u64 = 30;

/// Default key set fetch timeout in seconds.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Token validator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// How long a fetched key set is reused. Zero disables caching.
    pub jwks_cache_ttl: Duration,

    /// Minimum spacing of unknown-`kid` refetches per endpoint.
    pub jwks_min_refresh_interval: Duration,

    /// Timeout for a single key set fetch.
    pub jwks_fetch_timeout: Duration,

    /// Clock skew tolerance for `iat`.
    pub clock_skew: Duration,

    /// Algorithms tokens may be signed with.
    pub allowed_algorithms: Vec<Algorithm>,

    /// Required `iss` claim, if set.
    pub expected_issuer: Option<String>,

    /// Required `token_use` claim, if set.
    pub required_token_use: Option<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            jwks_cache_ttl: Duration::from_secs(DEFAULT_JWKS_CACHE_TTL_SECONDS),
            jwks_min_refresh_interval: Duration::from_secs(
                DEFAULT_JWKS_MIN_REFRESH_INTERVAL_SECONDS,
            ),
            jwks_fetch_timeout: Duration::from_secs(DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS),
            clock_skew: DEFAULT_CLOCK_SKEW,
            allowed_algorithms: vec![Algorithm::RS256],
            expected_issuer: None,
            required_token_use: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid JWKS cache configuration: {0}")]
    InvalidJwksCache(String),

    #[error("Invalid JWKS fetch timeout: {0}")]
    InvalidJwksFetchTimeout(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid JWT algorithm configuration: {0}")]
    InvalidAlgorithms(String),
}

impl ValidatorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let jwks_cache_ttl = Duration::from_secs(parse_seconds(
            vars,
            "JWKS_CACHE_TTL_SECONDS",
            DEFAULT_JWKS_CACHE_TTL_SECONDS,
            ConfigError::InvalidJwksCache,
        )?);

        let jwks_min_refresh_interval = Duration::from_secs(parse_seconds(
            vars,
            "JWKS_MIN_REFRESH_INTERVAL_SECONDS",
            DEFAULT_JWKS_MIN_REFRESH_INTERVAL_SECONDS,
            ConfigError::InvalidJwksCache,
        )?);

        let fetch_timeout_secs = parse_seconds(
            vars,
            "JWKS_FETCH_TIMEOUT_SECONDS",
            DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS,
            ConfigError::InvalidJwksFetchTimeout,
        )?;
        if fetch_timeout_secs == 0 {
            return Err(ConfigError::InvalidJwksFetchTimeout(
                "JWKS_FETCH_TIMEOUT_SECONDS must be greater than 0".to_string(),
            ));
        }

        // Parse JWT clock skew tolerance with validation
        let clock_skew = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{value_str}': {e}"
                ))
            })?;

            let max = MAX_CLOCK_SKEW.as_secs();
            match u64::try_from(value) {
                Ok(secs) if secs > 0 && secs <= max => Duration::from_secs(secs),
                _ if value <= 0 => {
                    return Err(ConfigError::InvalidJwtClockSkew(format!(
                        "JWT_CLOCK_SKEW_SECONDS must be positive, got {value}"
                    )))
                }
                _ => {
                    return Err(ConfigError::InvalidJwtClockSkew(format!(
                        "JWT_CLOCK_SKEW_SECONDS must not exceed {max} seconds, got {value}"
                    )))
                }
            }
        } else {
            DEFAULT_CLOCK_SKEW
        };

        let allowed_algorithms = match vars.get("JWT_ALLOWED_ALGORITHMS") {
            Some(value) => parse_algorithms(value)?,
            None => vec![Algorithm::RS256],
        };

        let non_empty = |name: &str| vars.get(name).filter(|v| !v.is_empty()).cloned();

        Ok(ValidatorConfig {
            jwks_cache_ttl,
            jwks_min_refresh_interval,
            jwks_fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            clock_skew,
            allowed_algorithms,
            expected_issuer: non_empty("JWT_EXPECTED_ISSUER"),
            required_token_use: non_empty("JWT_REQUIRED_TOKEN_USE"),
        })
    }

    /// Whether key sets are cached between validations.
    pub fn caching_enabled(&self) -> bool {
        !self.jwks_cache_ttl.is_zero()
    }

    /// Verification policy derived from this configuration.
    pub fn policy(&self) -> VerificationPolicy {
        VerificationPolicy {
            allowed_algorithms: self.allowed_algorithms.clone(),
            clock_skew: self.clock_skew,
            expected_issuer: self.expected_issuer.clone(),
            required_token_use: self.required_token_use.clone(),
        }
    }
}

fn parse_seconds(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
    invalid: fn(String) -> ConfigError,
) -> Result<u64, ConfigError> {
    match vars.get(name) {
        Some(value_str) => value_str.parse().map_err(|e| {
            invalid(format!(
                "{name} must be a valid non-negative integer, got '{value_str}': {e}"
            ))
        }),
        None => Ok(default),
    }
}

/// Parse a comma-separated algorithm list. HMAC algorithms are refused since
/// a published key set can only carry public keys.
fn parse_algorithms(value: &str) -> Result<Vec<Algorithm>, ConfigError> {
    let mut algorithms = Vec::new();

    for name in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let alg = Algorithm::from_str(name).map_err(|_| {
            ConfigError::InvalidAlgorithms(format!("unknown algorithm '{name}'"))
        })?;

        if matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(ConfigError::InvalidAlgorithms(format!(
                "symmetric algorithm '{name}' cannot be verified with a published key set"
            )));
        }

        if !algorithms.contains(&alg) {
            algorithms.push(alg);
        }
    }

    if algorithms.is_empty() {
        return Err(ConfigError::InvalidAlgorithms(
            "JWT_ALLOWED_ALGORITHMS must name at least one algorithm".to_string(),
        ));
    }

    Ok(algorithms)
}
