//! Token authorizer error types.
//!
//! Callers branch on [`ValidationError`] variants; the message returned to
//! a client is intentionally generic. The wrapped [`Rejection`] or
//! [`KeyResolutionError`] carries the detail for server-side logging.

use common::jwt::{JwtValidationError, TemporalClaimError};
use jsonwebtoken::Algorithm;
use std::fmt;
use thiserror::Error;

/// Generic message surfaced for every rejected token.
pub const INVALID_TOKEN_MESSAGE: &str = "The access token is invalid or expired";

/// Pipeline step at which a validation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationStep {
    Parsing,
    KeyResolution,
    SignatureCheck,
    ClaimCheck,
}

impl ValidationStep {
    /// Stable lowercase name, used for log fields and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStep::Parsing => "parsing",
            ValidationStep::KeyResolution => "key_resolution",
            ValidationStep::SignatureCheck => "signature_check",
            ValidationStep::ClaimCheck => "claim_check",
        }
    }
}

impl fmt::Display for ValidationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures of the key set resolver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyResolutionError {
    #[error("failed to fetch key set: {0}")]
    Transport(String),

    #[error("key set endpoint returned HTTP {0}")]
    Status(u16),

    #[error("key set document is malformed: {0}")]
    Malformed(String),

    #[error("key set document contains no keys")]
    EmptyKeySet,

    #[error("no key with id {kid:?} in key set")]
    KeyNotFound { kid: String },
}

/// Cryptographic and algorithm-policy failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("unsupported algorithm {0:?}")]
    UnsupportedAlgorithm(String),

    #[error("algorithm {0:?} is not allowed")]
    AlgorithmNotAllowed(Algorithm),

    #[error("key type {kty:?} cannot verify {alg:?}")]
    KeyTypeMismatch { alg: Algorithm, kty: String },

    #[error("key is published for {key_alg:?} but token declares {alg:?}")]
    KeyAlgorithmMismatch { alg: Algorithm, key_alg: String },

    #[error("key material is unusable: {0}")]
    InvalidKeyMaterial(String),

    #[error("signature does not verify")]
    Mismatch,

    #[error("verification failed: {0}")]
    Crypto(String),
}

/// Claim-set failures, checked after the signature verifies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    #[error(transparent)]
    Temporal(#[from] TemporalClaimError),

    #[error("claim set is malformed: {0}")]
    Malformed(String),

    #[error("issuer {actual:?} does not match {expected:?}")]
    IssuerMismatch {
        expected: String,
        actual: Option<String>,
    },

    #[error("token_use {actual:?} does not match {expected:?}")]
    TokenUseMismatch {
        expected: String,
        actual: Option<String>,
    },
}

/// Internal cause of an invalid-token outcome, retained for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("structural: {0}")]
    Structural(#[from] JwtValidationError),

    #[error("no key with id {kid:?} in key set")]
    KeyNotFound { kid: String },

    #[error("signature: {0}")]
    Signature(#[from] SignatureError),

    #[error("claims: {0}")]
    Claim(#[from] ClaimError),
}

/// Externally observable validation failure.
///
/// `InvalidToken` unifies structural, unknown-key, signature and claim
/// failures. `KeyResolution` means the key set itself could not be obtained
/// and the token's validity is unknown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{}", INVALID_TOKEN_MESSAGE)]
    InvalidToken(#[source] Rejection),

    #[error("Signing keys could not be resolved")]
    KeyResolution(#[source] KeyResolutionError),
}

impl ValidationError {
    /// The pipeline step that raised this error.
    pub fn step(&self) -> ValidationStep {
        match self {
            ValidationError::InvalidToken(Rejection::Structural(_)) => ValidationStep::Parsing,
            ValidationError::InvalidToken(Rejection::KeyNotFound { .. })
            | ValidationError::KeyResolution(_) => ValidationStep::KeyResolution,
            ValidationError::InvalidToken(Rejection::Signature(_)) => {
                ValidationStep::SignatureCheck
            }
            ValidationError::InvalidToken(Rejection::Claim(_)) => ValidationStep::ClaimCheck,
        }
    }

    pub fn is_invalid_token(&self) -> bool {
        matches!(self, ValidationError::InvalidToken(_))
    }

    pub fn is_key_resolution(&self) -> bool {
        matches!(self, ValidationError::KeyResolution(_))
    }

    /// Bounded label for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            ValidationError::InvalidToken(Rejection::Structural(_)) => "malformed",
            ValidationError::InvalidToken(Rejection::KeyNotFound { .. }) => "unknown_key",
            ValidationError::InvalidToken(Rejection::Signature(_)) => "signature",
            ValidationError::InvalidToken(Rejection::Claim(_)) => "claims",
            ValidationError::KeyResolution(_) => "key_resolution",
        }
    }

    /// Detailed cause for server-side logs. Never return this to a client.
    pub fn diagnostic(&self) -> String {
        match self {
            ValidationError::InvalidToken(rejection) => rejection.to_string(),
            ValidationError::KeyResolution(err) => err.to_string(),
        }
    }
}

impl From<Rejection> for ValidationError {
    fn from(rejection: Rejection) -> Self {
        ValidationError::InvalidToken(rejection)
    }
}

/// A missing key is a property of the token, not of the endpoint, so it
/// is reported as an invalid token. Every other resolver failure is passed
/// through unchanged.
impl From<KeyResolutionError> for ValidationError {
    fn from(err: KeyResolutionError) -> Self {
        match err {
            KeyResolutionError::KeyNotFound { kid } => {
                ValidationError::InvalidToken(Rejection::KeyNotFound { kid })
            }
            other => ValidationError::KeyResolution(other),
        }
    }
}

impl From<JwtValidationError> for ValidationError {
    fn from(err: JwtValidationError) -> Self {
        ValidationError::InvalidToken(Rejection::Structural(err))
    }
}

impl From<SignatureError> for ValidationError {
    fn from(err: SignatureError) -> Self {
        ValidationError::InvalidToken(Rejection::Signature(err))
    }
}

impl From<ClaimError> for ValidationError {
    fn from(err: ClaimError) -> Self {
        ValidationError::InvalidToken(Rejection::Claim(err))
    }
}
