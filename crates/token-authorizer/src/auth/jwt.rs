//! Token verifier.
//!
//! Verifies a bearer token against the key set published at a caller-supplied
//! endpoint and returns the verified header and claims.
//!
//! # Security Checks
//!
//! 1. Size and shape check - all three segments must decode before anything else
//! 2. `kid` must be present in the header
//! 3. Key set is resolved and the key looked up by `kid`
//! 4. Header `alg` must be allow-listed and match the key's type and published
//!    algorithm (algorithm-confusion defense), then the signature is verified
//! 5. `exp`, `nbf`, `iat`, and optionally `iss` and `token_use` are checked
//!
//! Every failure after step 3 is reported as an invalid token; the specific
//! check is kept in the error's source for logging.

use crate::auth::claims::{Claims, ParsedToken, TokenHeader};
use crate::auth::jwks::{Jwk, KeySetSource};
use crate::errors::{ClaimError, KeyResolutionError, SignatureError, ValidationError};
use common::jwt::{
    decode_unverified, validate_exp_at, validate_iat_at, validate_nbf_at, JwtValidationError,
    DEFAULT_CLOCK_SKEW,
};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Which tokens the verifier accepts beyond a valid signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationPolicy {
    /// Algorithms a token header may declare. HMAC algorithms never verify.
    pub allowed_algorithms: Vec<Algorithm>,

    /// Clock skew tolerance for the `iat` claim.
    pub clock_skew: Duration,

    /// Required `iss` value, if any.
    pub expected_issuer: Option<String>,

    /// Required `token_use` value, if any.
    pub required_token_use: Option<String>,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            allowed_algorithms: vec![Algorithm::RS256],
            clock_skew: DEFAULT_CLOCK_SKEW,
            expected_issuer: None,
            required_token_use: None,
        }
    }
}

/// JWT verifier backed by a key set source.
pub struct TokenVerifier {
    key_source: Arc<dyn KeySetSource>,
    policy: VerificationPolicy,
}

impl TokenVerifier {
    /// Create a new verifier.
    ///
    /// # Arguments
    ///
    /// * `key_source` - Where key sets are fetched from (possibly cached)
    /// * `policy` - Algorithm allow-list and claim requirements
    pub fn new(key_source: Arc<dyn KeySetSource>, policy: VerificationPolicy) -> Self {
        Self { key_source, policy }
    }

    pub fn policy(&self) -> &VerificationPolicy {
        &self.policy
    }

    /// Verify a token against the key set at `endpoint`.
    ///
    /// # Errors
    ///
    /// `KeyResolution` if the key set cannot be fetched or parsed; `InvalidToken`
    /// for every other failure.
    #[instrument(skip_all)]
    pub async fn verify(&self, token: &str, endpoint: &str) -> Result<ParsedToken, ValidationError> {
        self.verify_at(token, endpoint, chrono::Utc::now().timestamp())
            .await
    }

    /// Verification against an explicit `now` (Unix epoch seconds).
    pub(crate) async fn verify_at(
        &self,
        token: &str,
        endpoint: &str,
        now: i64,
    ) -> Result<ParsedToken, ValidationError> {
        // 1. Decode segments without trusting them
        let unverified = decode_unverified(token)?;

        // 2. Key ID selects the key
        let kid = unverified.header.kid.ok_or_else(|| {
            tracing::debug!(target: "authorizer.jwt", "Token header has no kid");
            JwtValidationError::MissingKid
        })?;

        // 3. Resolve the signing key
        let jwk = self.resolve_key(&kid, endpoint).await?;

        // 4. Algorithm policy, then signature
        let alg = check_algorithm(&unverified.header.alg, &jwk, &self.policy.allowed_algorithms)
            .inspect_err(|e| {
                tracing::warn!(target: "authorizer.jwt", kid = %kid, error = %e, "Token algorithm rejected");
            })?;
        let decoding_key = decoding_key(&jwk, alg)?;
        let claims = verify_signature(token, &decoding_key, alg)?;

        // 5. Claims
        check_claims(&claims, &self.policy, now).inspect_err(|e| {
            tracing::debug!(target: "authorizer.jwt", error = %e, "Token claims rejected");
        })?;

        tracing::debug!(target: "authorizer.jwt", kid = %kid, "Token verified");
        Ok(ParsedToken {
            header: TokenHeader {
                alg,
                kid,
                typ: unverified.header.typ,
            },
            claims,
        })
    }

    /// Fetch the key set and find `kid`, allowing the source one refetch on a miss.
    async fn resolve_key(&self, kid: &str, endpoint: &str) -> Result<Jwk, KeyResolutionError> {
        let key_set = self.key_source.fetch_key_set(endpoint).await?;
        if let Ok(jwk) = key_set.lookup(kid) {
            return Ok(jwk.clone());
        }

        let found = match self.key_source.refetch_on_miss(endpoint).await? {
            Some(refreshed) => refreshed.lookup(kid).cloned(),
            None => key_set.lookup(kid).cloned(),
        };

        found.inspect_err(|_| {
            tracing::warn!(target: "authorizer.jwt", kid = %kid, "Key not found in JWKS");
        })
    }
}

/// Key type a JWK must have to verify `alg`.
fn required_key_type(alg: Algorithm) -> Option<&'static str> {
    match alg {
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => Some("RSA"),
        Algorithm::ES256 | Algorithm::ES384 => Some("EC"),
        Algorithm::EdDSA => Some("OKP"),
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => None,
    }
}

/// Decide which algorithm to verify with.
///
/// The header's claim is only accepted when it is allow-listed, asymmetric,
/// matches the key type, and matches the algorithm the key was published for.
fn check_algorithm(
    header_alg: &str,
    jwk: &Jwk,
    allowed: &[Algorithm],
) -> Result<Algorithm, SignatureError> {
    let alg = Algorithm::from_str(header_alg)
        .map_err(|_| SignatureError::UnsupportedAlgorithm(header_alg.to_string()))?;

    if !allowed.contains(&alg) {
        return Err(SignatureError::AlgorithmNotAllowed(alg));
    }

    let kty = required_key_type(alg).ok_or(SignatureError::AlgorithmNotAllowed(alg))?;
    if jwk.kty != kty {
        return Err(SignatureError::KeyTypeMismatch {
            alg,
            kty: jwk.kty.clone(),
        });
    }

    if let Some(key_alg) = &jwk.alg {
        if key_alg != header_alg {
            return Err(SignatureError::KeyAlgorithmMismatch {
                alg,
                key_alg: key_alg.clone(),
            });
        }
    }

    if let Some(key_use) = &jwk.key_use {
        if key_use != "sig" {
            return Err(SignatureError::InvalidKeyMaterial(format!(
                "key use is {key_use:?}, not \"sig\""
            )));
        }
    }

    Ok(alg)
}

/// Build a verification key from the JWK's public components.
fn decoding_key(jwk: &Jwk, alg: Algorithm) -> Result<DecodingKey, SignatureError> {
    let missing = |field: &str| {
        tracing::error!(target: "authorizer.jwt", kid = %jwk.kid, field = field, "JWK missing key component");
        SignatureError::InvalidKeyMaterial(format!("JWK has no {field}"))
    };
    let invalid = |e: jsonwebtoken::errors::Error| {
        tracing::error!(target: "authorizer.jwt", kid = %jwk.kid, error = %e, "Invalid JWK key material");
        SignatureError::InvalidKeyMaterial(e.to_string())
    };

    match required_key_type(alg) {
        Some("RSA") => {
            let n = jwk.n.as_deref().ok_or_else(|| missing("n"))?;
            let e = jwk.e.as_deref().ok_or_else(|| missing("e"))?;
            DecodingKey::from_rsa_components(n, e).map_err(invalid)
        }
        Some("OKP") => {
            if let Some(crv) = jwk.crv.as_deref().filter(|crv| *crv != "Ed25519") {
                return Err(SignatureError::InvalidKeyMaterial(format!(
                    "unsupported OKP curve {crv:?}"
                )));
            }
            let x = jwk.x.as_deref().ok_or_else(|| missing("x"))?;
            DecodingKey::from_ed_components(x).map_err(invalid)
        }
        Some("EC") => {
            let x = jwk.x.as_deref().ok_or_else(|| missing("x"))?;
            let y = jwk.y.as_deref().ok_or_else(|| missing("y"))?;
            DecodingKey::from_ec_components(x, y).map_err(invalid)
        }
        _ => Err(SignatureError::AlgorithmNotAllowed(alg)),
    }
}

/// Verify the signature and decode the claim set.
///
/// The library's own temporal checks are disabled; [`check_claims`] owns them.
fn verify_signature(
    token: &str,
    key: &DecodingKey,
    alg: Algorithm,
) -> Result<Claims, ValidationError> {
    let mut validation = Validation::new(alg);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let token_data = decode::<Claims>(token, key, &validation).map_err(|e| {
        tracing::debug!(target: "authorizer.jwt", error = %e, "Token verification failed");
        match e.kind() {
            ErrorKind::InvalidSignature => ValidationError::from(SignatureError::Mismatch),
            ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidKeyFormat => {
                ValidationError::from(SignatureError::InvalidKeyMaterial(e.to_string()))
            }
            // The header is decoded again before the signature check; a field
            // of the wrong type there is a structural fault, not a claim fault
            ErrorKind::Json(_) | ErrorKind::Utf8(_) | ErrorKind::Base64(_)
                if decode_header(token).is_err() =>
            {
                ValidationError::from(JwtValidationError::MalformedToken(
                    "header fields have the wrong type",
                ))
            }
            ErrorKind::Json(_) | ErrorKind::Utf8(_) | ErrorKind::Base64(_) => {
                ValidationError::from(ClaimError::Malformed(e.to_string()))
            }
            _ => ValidationError::from(SignatureError::Crypto(e.to_string())),
        }
    })?;

    Ok(token_data.claims)
}

/// Temporal and provider-specific claim checks.
fn check_claims(claims: &Claims, policy: &VerificationPolicy, now: i64) -> Result<(), ClaimError> {
    validate_exp_at(claims.exp, now)?;
    validate_nbf_at(claims.nbf, now)?;
    if let Some(iat) = claims.iat {
        validate_iat_at(iat, policy.clock_skew, now)?;
    }

    if let Some(expected) = &policy.expected_issuer {
        if claims.iss.as_ref() != Some(expected) {
            return Err(ClaimError::IssuerMismatch {
                expected: expected.clone(),
                actual: claims.iss.clone(),
            });
        }
    }

    if let Some(expected) = &policy.required_token_use {
        if claims.token_use.as_ref() != Some(expected) {
            return Err(ClaimError::TokenUseMismatch {
                expected: expected.clone(),
                actual: claims.token_use.clone(),
            });
        }
    }

    Ok(())
}
