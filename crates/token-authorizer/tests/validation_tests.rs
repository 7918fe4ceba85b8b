//! Token validation integration tests.
//!
//! Runs the validation facade end to end against a mocked JWKS endpoint.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use authorizer_test_utils::{
    tamper_payload, MockJwksServer, TestSigningKey, TestTokenBuilder, EXPIRED_TOKEN_EXP,
    PROVIDER_KID, TEST_CLIENT_ID, TEST_PRINCIPAL, UNSIGNED_GARBAGE_TOKEN,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use common::jwt::{JwtValidationError, TemporalClaimError};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;
use std::time::Duration;
use token_authorizer::errors::{ClaimError, KeyResolutionError, SignatureError};
use token_authorizer::{
    Rejection, TokenValidator, ValidationError, ValidationStep, ValidatorConfig,
};
use wiremock::ResponseTemplate;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("authorizer=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Validator without a key set cache, so each call hits the mock server.
fn uncached_validator() -> TokenValidator {
    TokenValidator::new(&ValidatorConfig {
        jwks_cache_ttl: Duration::ZERO,
        ..ValidatorConfig::default()
    })
}

fn expired_token(key: &TestSigningKey) -> String {
    TestTokenBuilder::new()
        .issued_at(EXPIRED_TOKEN_EXP - 3600)
        .expires_at(EXPIRED_TOKEN_EXP)
        .sign_with(key)
}

// ============================================================================
// Success path
// ============================================================================

#[tokio::test]
async fn test_valid_token_maps_to_principal() -> Result<()> {
    init_tracing();
    let key = TestSigningKey::rsa_primary();
    let server = MockJwksServer::serving(&[&key]).await;

    let token = TestTokenBuilder::new().sign_with(&key);
    let principal = uncached_validator()
        .validate(&token, &server.jwks_url())
        .await?;

    assert_eq!(principal.as_str(), TEST_PRINCIPAL);
    assert_eq!(principal.to_string(), "pulpfree|5n63nd473pv7ne2qskv30gkcbh");
    Ok(())
}

#[tokio::test]
async fn test_principal_uses_token_claims() -> Result<()> {
    let key = TestSigningKey::rsa_primary();
    let server = MockJwksServer::serving(&[&key]).await;

    let token = TestTokenBuilder::new()
        .for_user("alice")
        .for_client("web-app")
        .sign_with(&key);
    let principal = uncached_validator()
        .validate(&token, &server.jwks_url())
        .await?;

    assert_eq!(principal.as_str(), "alice|web-app");
    Ok(())
}

#[tokio::test]
async fn test_missing_username_gives_empty_segment() -> Result<()> {
    let key = TestSigningKey::rsa_primary();
    let server = MockJwksServer::serving(&[&key]).await;

    let token = TestTokenBuilder::new()
        .without_claim("username")
        .sign_with(&key);
    let principal = uncached_validator()
        .validate(&token, &server.jwks_url())
        .await?;

    assert_eq!(principal.into_string(), format!("|{TEST_CLIENT_ID}"));
    Ok(())
}

#[tokio::test]
async fn test_null_username_gives_empty_segment() -> Result<()> {
    let key = TestSigningKey::rsa_primary();
    let server = MockJwksServer::serving(&[&key]).await;

    let mut claims = TestTokenBuilder::new().for_client("app").build();
    claims["username"] = serde_json::Value::Null;
    let token = key.sign(&claims);

    let principal = uncached_validator()
        .validate(&token, &server.jwks_url())
        .await?;

    assert_eq!(principal.as_str(), "|app");
    Ok(())
}

#[tokio::test]
async fn test_validate_is_idempotent() -> Result<()> {
    let key = TestSigningKey::rsa_primary();
    let server = MockJwksServer::serving(&[&key]).await;
    let validator = uncached_validator();
    let token = TestTokenBuilder::new().sign_with(&key);

    let first = validator.validate(&token, &server.jwks_url()).await?;
    let second = validator.validate(&token, &server.jwks_url()).await?;

    assert_eq!(first, second);
    assert_eq!(server.request_count().await, 2);
    Ok(())
}

#[tokio::test]
async fn test_key_set_with_several_keys() -> Result<()> {
    let primary = TestSigningKey::rsa_primary();
    let secondary = TestSigningKey::rsa_secondary();
    let server = MockJwksServer::serving(&[&primary, &secondary]).await;
    let validator = uncached_validator();

    for key in [&primary, &secondary] {
        let token = TestTokenBuilder::new().sign_with(key);
        let principal = validator.validate(&token, &server.jwks_url()).await?;
        assert_eq!(principal.as_str(), TEST_PRINCIPAL);
    }
    Ok(())
}

#[tokio::test]
async fn test_free_function_validate() -> Result<()> {
    let key = TestSigningKey::rsa_primary();
    let server = MockJwksServer::serving(&[&key]).await;

    let token = TestTokenBuilder::new().sign_with(&key);
    let principal = token_authorizer::validate(&token, &server.jwks_url()).await?;

    assert_eq!(principal.as_str(), TEST_PRINCIPAL);
    Ok(())
}

// ============================================================================
// Invalid tokens
// ============================================================================

#[tokio::test]
async fn test_expired_token_is_invalid() {
    init_tracing();
    let key = TestSigningKey::rsa_primary();
    let server = MockJwksServer::serving(&[&key]).await;

    let err = uncached_validator()
        .validate(&expired_token(&key), &server.jwks_url())
        .await
        .unwrap_err();

    assert!(err.is_invalid_token());
    assert_eq!(err.step(), ValidationStep::ClaimCheck);
    assert!(matches!(
        err,
        ValidationError::InvalidToken(Rejection::Claim(ClaimError::Temporal(
            TemporalClaimError::Expired { exp: EXPIRED_TOKEN_EXP, .. }
        )))
    ));
    assert_eq!(err.to_string(), "The access token is invalid or expired");
}

#[tokio::test]
async fn test_garbage_token_is_invalid_without_fetching() {
    let key = TestSigningKey::rsa_primary();
    let server = MockJwksServer::serving(&[&key]).await;

    let err = uncached_validator()
        .validate(UNSIGNED_GARBAGE_TOKEN, &server.jwks_url())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ValidationError::InvalidToken(Rejection::Structural(JwtValidationError::MissingKid))
    );
    assert_eq!(err.step(), ValidationStep::Parsing);
    assert_eq!(server.request_count().await, 0);
}

#[tokio::test]
async fn test_malformed_tokens_are_invalid() {
    let key = TestSigningKey::rsa_primary();
    let server = MockJwksServer::serving(&[&key]).await;
    let validator = uncached_validator();

    let oversized = "a".repeat(9000);
    for token in ["", "abc", "a.b", "a.b.c.d", "!!!.@@@.###", oversized.as_str()] {
        let err = validator
            .validate(token, &server.jwks_url())
            .await
            .unwrap_err();
        assert!(
            matches!(err, ValidationError::InvalidToken(Rejection::Structural(_))),
            "token {:?} gave {err:?}",
            token.get(..16)
        );
    }
}

#[tokio::test]
async fn test_signature_from_unpublished_key_is_invalid() {
    let published = TestSigningKey::rsa_primary();
    let server = MockJwksServer::serving(&[&published]).await;

    // Signed by a different private key under the published kid
    let forged = TestTokenBuilder::new()
        .sign_with(&TestSigningKey::rsa_secondary().with_kid(PROVIDER_KID));

    let err = uncached_validator()
        .validate(&forged, &server.jwks_url())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ValidationError::InvalidToken(Rejection::Signature(SignatureError::Mismatch))
    );
}

#[tokio::test]
async fn test_tampered_claims_are_invalid() {
    let key = TestSigningKey::rsa_primary();
    let server = MockJwksServer::serving(&[&key]).await;

    let token = TestTokenBuilder::new().sign_with(&key);
    let forged = tamper_payload(&token, &TestTokenBuilder::new().for_user("root").build());

    let err = uncached_validator()
        .validate(&forged, &server.jwks_url())
        .await
        .unwrap_err();
    assert!(err.is_invalid_token());
    assert_eq!(err.step(), ValidationStep::SignatureCheck);
}

#[tokio::test]
async fn test_unknown_kid_is_invalid_token() {
    let server = MockJwksServer::serving(&[&TestSigningKey::rsa_primary()]).await;

    let token = TestTokenBuilder::new().sign_with(&TestSigningKey::rsa_secondary());

    let err = uncached_validator()
        .validate(&token, &server.jwks_url())
        .await
        .unwrap_err();
    assert!(err.is_invalid_token());
    assert!(matches!(
        err,
        ValidationError::InvalidToken(Rejection::KeyNotFound { .. })
    ));
    assert_eq!(err.step(), ValidationStep::KeyResolution);
}

#[tokio::test]
async fn test_hmac_signed_with_public_key_is_invalid() {
    let key = TestSigningKey::rsa_primary();
    let server = MockJwksServer::serving(&[&key]).await;

    // Classic confusion: HS256 keyed with the published RSA modulus
    let modulus = key.jwk_json()["n"].as_str().unwrap().to_string();
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(PROVIDER_KID.to_string());
    let token = encode(
        &header,
        &TestTokenBuilder::new().build(),
        &EncodingKey::from_secret(modulus.as_bytes()),
    )
    .unwrap();

    let err = uncached_validator()
        .validate(&token, &server.jwks_url())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ValidationError::InvalidToken(Rejection::Signature(SignatureError::AlgorithmNotAllowed(
            Algorithm::HS256
        )))
    );
}

#[tokio::test]
async fn test_alg_none_is_invalid() {
    let key = TestSigningKey::rsa_primary();
    let server = MockJwksServer::serving(&[&key]).await;

    let header = URL_SAFE_NO_PAD.encode(format!(r#"{{"alg":"none","kid":"{PROVIDER_KID}"}}"#));
    let payload = URL_SAFE_NO_PAD.encode(TestTokenBuilder::new().build().to_string());
    let token = format!("{header}.{payload}.");

    let err = uncached_validator()
        .validate(&token, &server.jwks_url())
        .await
        .unwrap_err();
    assert!(err.is_invalid_token());
    assert_eq!(err.step(), ValidationStep::SignatureCheck);
}

#[tokio::test]
async fn test_not_yet_valid_token_is_invalid() {
    let key = TestSigningKey::rsa_primary();
    let server = MockJwksServer::serving(&[&key]).await;

    let token = TestTokenBuilder::new()
        .not_before(chrono::Utc::now().timestamp() + 600)
        .sign_with(&key);

    let err = uncached_validator()
        .validate(&token, &server.jwks_url())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ValidationError::InvalidToken(Rejection::Claim(ClaimError::Temporal(
            TemporalClaimError::NotYetValid { .. }
        )))
    ));
}

#[tokio::test]
async fn test_configured_issuer_is_enforced() -> Result<()> {
    let key = TestSigningKey::rsa_primary();
    let server = MockJwksServer::serving(&[&key]).await;
    let validator = TokenValidator::new(&ValidatorConfig {
        expected_issuer: Some("https://idp.example.com/other-pool".to_string()),
        ..ValidatorConfig::default()
    });

    let err = validator
        .validate(&TestTokenBuilder::new().sign_with(&key), &server.jwks_url())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ValidationError::InvalidToken(Rejection::Claim(ClaimError::IssuerMismatch { .. }))
    ));

    let token = TestTokenBuilder::new()
        .with_issuer("https://idp.example.com/other-pool")
        .sign_with(&key);
    validator.validate(&token, &server.jwks_url()).await?;
    Ok(())
}

// ============================================================================
// Key resolution failures
// ============================================================================

/// Tokens that carry a kid, from valid to broken.
fn assorted_tokens() -> Vec<String> {
    let key = TestSigningKey::rsa_primary();
    vec![
        TestTokenBuilder::new().sign_with(&key),
        expired_token(&key),
        TestTokenBuilder::new().sign_with(&TestSigningKey::rsa_secondary()),
        TestTokenBuilder::new().sign_with(&TestSigningKey::rsa_secondary().with_kid(PROVIDER_KID)),
    ]
}

#[tokio::test]
async fn test_not_found_endpoint_is_key_resolution_error() {
    // Nothing mounted: every request is a 404
    let server = MockJwksServer::start().await;
    let validator = uncached_validator();

    for token in assorted_tokens() {
        let err = validator
            .validate(&token, &server.jwks_url())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::KeyResolution(KeyResolutionError::Status(404))
        );
        assert!(!err.is_invalid_token());
    }
}

#[tokio::test]
async fn test_empty_body_is_key_resolution_error() {
    let server = MockJwksServer::start().await;
    server.respond_with(ResponseTemplate::new(200)).await;
    let validator = uncached_validator();

    for token in assorted_tokens() {
        let err = validator
            .validate(&token, &server.jwks_url())
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                ValidationError::KeyResolution(KeyResolutionError::Malformed(_))
            ),
            "got {err:?}"
        );
    }
}

#[tokio::test]
async fn test_empty_key_set_is_key_resolution_error() {
    let server = MockJwksServer::start().await;
    server.publish_json(json!({ "keys": [] })).await;
    let validator = uncached_validator();

    for token in assorted_tokens() {
        let err = validator
            .validate(&token, &server.jwks_url())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::KeyResolution(KeyResolutionError::EmptyKeySet)
        );
    }
}

#[tokio::test]
async fn test_malformed_key_set_is_key_resolution_error() {
    let server = MockJwksServer::start().await;
    server
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .await;

    let err = uncached_validator()
        .validate(&assorted_tokens()[0], &server.jwks_url())
        .await
        .unwrap_err();
    assert!(err.is_key_resolution());
    assert_eq!(err.step(), ValidationStep::KeyResolution);
}

#[tokio::test]
async fn test_unreachable_endpoint_is_key_resolution_error() {
    let validator = TokenValidator::new(&ValidatorConfig {
        jwks_cache_ttl: Duration::ZERO,
        jwks_fetch_timeout: Duration::from_secs(2),
        ..ValidatorConfig::default()
    });

    let err = validator
        .validate(&assorted_tokens()[0], "http://127.0.0.1:9/.well-known/jwks.json")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ValidationError::KeyResolution(KeyResolutionError::Transport(_))
    ));
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let server = MockJwksServer::start().await;
    server
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(TestSigningKey::jwks_json(&[&TestSigningKey::rsa_primary()]))
                .set_delay(Duration::from_secs(5)),
        )
        .await;
    let validator = TokenValidator::new(&ValidatorConfig {
        jwks_fetch_timeout: Duration::from_millis(200),
        ..ValidatorConfig::default()
    });

    let err = validator
        .validate(&assorted_tokens()[0], &server.jwks_url())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ValidationError::KeyResolution(KeyResolutionError::Transport(_))
    ));
}
