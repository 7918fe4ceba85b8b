//! Metrics definitions for the token authorizer.
//!
//! All metrics follow Prometheus naming conventions:
//! - `authorizer_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `status`: 2 values (success, error)
//! - `error_type`: 6 values (none plus `ValidationError::error_type`)
//! - `result`: 5 values (hit, miss, coalesced, refetch, refetch_skipped)

use metrics::{counter, histogram};
use std::time::Duration;

// ============================================================================
// Validation Metrics
// ============================================================================

/// Record the outcome of one `validate` call.
///
/// Metric: `authorizer_token_validations_total`, `authorizer_token_validation_duration_seconds`
/// Labels: `status`, `error_type`
pub fn record_token_validation(status: &str, error_type: Option<&str>, duration: Duration) {
    histogram!("authorizer_token_validation_duration_seconds",
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("authorizer_token_validations_total",
        "status" => status.to_string(),
        "error_type" => error_type.unwrap_or("none").to_string()
    )
    .increment(1);
}

// ============================================================================
// Key Set Metrics
// ============================================================================

/// Record one HTTP key set fetch.
///
/// Metric: `authorizer_jwks_fetch_total`, `authorizer_jwks_fetch_duration_seconds`
/// Labels: `status`
pub fn record_jwks_fetch(status: &str, duration: Duration) {
    histogram!("authorizer_jwks_fetch_duration_seconds").record(duration.as_secs_f64());

    counter!("authorizer_jwks_fetch_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a key set cache lookup.
///
/// Metric: `authorizer_jwks_cache_total`
/// Labels: `result`
pub fn record_jwks_cache(result: &str) {
    counter!("authorizer_jwks_cache_total",
        "result" => result.to_string()
    )
    .increment(1);
}
