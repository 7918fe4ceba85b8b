//! JWT primitives shared by services that accept bearer tokens.
//!
//! This module provides the parts of token handling that do not depend on
//! any particular key source:
//! - Size limits for DoS prevention
//! - Clock skew constants for iat validation
//! - Unverified decoding of the three token segments and key ID extraction
//! - Temporal claim checks (`exp`, `nbf`, `iat`) against an explicit `now`
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing returned by [`decode_unverified`] is trusted; it only tells the
//!   caller which key to fetch and which algorithm the token claims to use
//! - Error messages describe the failed check for diagnostic logging; callers
//!   are expected to collapse them into a generic rejection at their boundary
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{decode_unverified, validate_exp_at, validate_iat_at, DEFAULT_CLOCK_SKEW};
//!
//! let unverified = decode_unverified(token)?;
//! let kid = unverified.header.kid.as_deref();
//!
//! // After signature verification
//! let now = chrono::Utc::now().timestamp();
//! validate_exp_at(claims.exp, now)?;
//! validate_iat_at(claims.iat, DEFAULT_CLOCK_SKEW, now)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any base64 decoding or
/// cryptographic work.
///
/// # Rationale
///
/// - Typical provider access tokens are 800-1200 bytes (RS256 signature is 342 chars)
/// - 8KB leaves room for large custom claim sets
/// - Checked before allocation of decode buffers
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (5 minutes).
///
/// Tokens with `iat` (issued-at) timestamps more than this amount in the
/// future are rejected.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
///
/// Upper bound for configuration so a typo cannot disable the iat check.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Structural problems found while decoding a token without verifying it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds [`MAX_JWT_SIZE_BYTES`].
    #[error("token exceeds maximum size of {MAX_JWT_SIZE_BYTES} bytes")]
    TokenTooLarge,

    /// Token is not three base64url segments with a JSON object header.
    #[error("token is malformed: {0}")]
    MalformedToken(&'static str),

    /// Header has no usable `kid` (absent, not a string, or empty).
    #[error("token header has no string kid")]
    MissingKid,

    /// Header has no `alg` string.
    #[error("token header has no string alg")]
    MissingAlgorithm,
}

/// Temporal claim failures, checked after the signature has been verified.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemporalClaimError {
    /// Current time is at or after `exp`.
    #[error("token expired at {exp} (now {now})")]
    Expired { exp: i64, now: i64 },

    /// Current time is before `nbf`.
    #[error("token not valid before {nbf} (now {now})")]
    NotYetValid { nbf: i64, now: i64 },

    /// `iat` is further in the future than the clock skew allows.
    #[error("token issued at {iat}, more than {clock_skew_secs}s after now ({now})")]
    IatTooFarInFuture {
        iat: i64,
        now: i64,
        clock_skew_secs: i64,
    },
}

// =============================================================================
// Types
// =============================================================================

/// Header fields needed before a key has been chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnverifiedHeader {
    /// Declared signing algorithm, exactly as written in the token.
    pub alg: String,

    /// Key identifier, `None` when absent, non-string or empty.
    pub kid: Option<String>,

    /// Declared token type, informational only.
    pub typ: Option<String>,
}

/// A token whose three segments decode. Nothing here is trusted.
#[derive(Debug, Clone)]
pub struct UnverifiedToken {
    pub header: UnverifiedHeader,
}

// =============================================================================
// Functions
// =============================================================================

/// Split a JWT into its three segments and base64url-decode each of them
/// without verifying anything.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing (denial-of-service prevention)
/// - The returned header MUST only be used to select a key from a trusted key set
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Wrong segment count, bad base64url, or header is not a JSON object
/// - `MissingAlgorithm` - Header has no string `alg`
pub fn decode_unverified(token: &str) -> Result<UnverifiedToken, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let mut parts = token.split('.');
    let (Some(header_part), Some(payload_part), Some(signature_part), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(
            target: "common.jwt",
            parts = token.split('.').count(),
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken("expected three segments"));
    };

    let header_bytes = decode_segment(header_part, "header")?;
    decode_segment(payload_part, "payload")?;
    decode_segment(signature_part, "signature")?;

    let header_json: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken("header is not JSON")
    })?;

    let header_object = header_json
        .as_object()
        .ok_or(JwtValidationError::MalformedToken("header is not a JSON object"))?;

    let alg = header_object
        .get("alg")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingAlgorithm)?;

    // Empty kid is treated as absent
    let kid = header_object
        .get("kid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string);

    let typ = header_object
        .get("typ")
        .and_then(|v| v.as_str())
        .map(ToString::to_string);

    Ok(UnverifiedToken {
        header: UnverifiedHeader { alg, kid, typ },
    })
}

fn decode_segment(segment: &str, name: &'static str) -> Result<Vec<u8>, JwtValidationError> {
    URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "common.jwt", segment = name, error = %e, "Failed to decode JWT segment base64");
        JwtValidationError::MalformedToken("segment is not base64url")
    })
}

/// Validate the `exp` claim against `now` (Unix epoch seconds).
///
/// # Errors
///
/// Returns `TemporalClaimError::Expired` when `now >= exp`.
pub fn validate_exp_at(exp: i64, now: i64) -> Result<(), TemporalClaimError> {
    if now >= exp {
        tracing::debug!(target: "common.jwt", exp = exp, now = now, "Token rejected: expired");
        return Err(TemporalClaimError::Expired { exp, now });
    }
    Ok(())
}

/// Validate an optional `nbf` claim against `now`. An absent claim always passes.
///
/// # Errors
///
/// Returns `TemporalClaimError::NotYetValid` when `now < nbf`.
pub fn validate_nbf_at(nbf: Option<i64>, now: i64) -> Result<(), TemporalClaimError> {
    match nbf {
        Some(nbf) if now < nbf => {
            tracing::debug!(target: "common.jwt", nbf = nbf, now = now, "Token rejected: not yet valid");
            Err(TemporalClaimError::NotYetValid { nbf, now })
        }
        _ => Ok(()),
    }
}

/// Validate the `iat` (issued-at) claim with clock skew tolerance.
///
/// Rejects tokens with `iat` too far in the future, which usually means
/// pre-generated or tampered tokens, or badly drifted clocks.
///
/// # Errors
///
/// Returns `TemporalClaimError::IatTooFarInFuture` when `iat > now + clock_skew`.
pub fn validate_iat_at(iat: i64, clock_skew: Duration, now: i64) -> Result<(), TemporalClaimError> {
    // Skew is bounded to MAX_CLOCK_SKEW by configuration; saturate anyway
    let clock_skew_secs = i64::try_from(clock_skew.as_secs()).unwrap_or(i64::MAX);
    let max_iat = now.saturating_add(clock_skew_secs);

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            clock_skew_secs = clock_skew_secs,
            "Token rejected: iat too far in the future"
        );
        return Err(TemporalClaimError::IatTooFarInFuture {
            iat,
            now,
            clock_skew_secs,
        });
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
