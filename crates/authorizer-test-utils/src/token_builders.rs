//! Builder patterns for test tokens
//!
//! Claims default to a fresh access token for [`TEST_USERNAME`] issued to
//! [`TEST_CLIENT_ID`], valid for an hour.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use crate::crypto_fixtures::TestSigningKey;
use crate::test_vectors::{TEST_CLIENT_ID, TEST_ISSUER, TEST_USERNAME};

/// Builder for test token claims
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_user("alice")
///     .with_scope("openid profile")
///     .expires_in(3600)
///     .sign_with(&TestSigningKey::rsa_primary());
/// ```
pub struct TestTokenBuilder {
    sub: String,
    username: String,
    client_id: String,
    scope: String,
    iss: String,
    token_use: String,
    exp: i64,
    iat: i64,
    nbf: Option<i64>,
    omitted: Vec<String>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            sub: "2a8daa4d-a0ca-441e-b079-7ba923dffcc9".to_string(),
            username: TEST_USERNAME.to_string(),
            client_id: TEST_CLIENT_ID.to_string(),
            scope: "aws.cognito.signin.user.admin".to_string(),
            iss: TEST_ISSUER.to_string(),
            token_use: "access".to_string(),
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
            nbf: None,
            omitted: Vec::new(),
        }
    }

    pub fn for_user(mut self, username: &str) -> Self {
        self.username = username.to_string();
        self
    }

    pub fn for_client(mut self, client_id: &str) -> Self {
        self.client_id = client_id.to_string();
        self
    }

    /// Set the scope (space-separated)
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = scope.to_string();
        self
    }

    pub fn with_issuer(mut self, iss: &str) -> Self {
        self.iss = iss.to_string();
        self
    }

    pub fn with_token_use(mut self, token_use: &str) -> Self {
        self.token_use = token_use.to_string();
        self
    }

    /// Set expiration in seconds from now
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Set an absolute expiration timestamp
    pub fn expires_at(mut self, timestamp: i64) -> Self {
        self.exp = timestamp;
        self
    }

    /// Expired an hour ago, issued two hours ago
    pub fn expired(mut self) -> Self {
        let now = Utc::now();
        self.exp = (now - Duration::seconds(3600)).timestamp();
        self.iat = (now - Duration::seconds(7200)).timestamp();
        self
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = timestamp;
        self
    }

    /// Set not-before timestamp
    pub fn not_before(mut self, timestamp: i64) -> Self {
        self.nbf = Some(timestamp);
        self
    }

    /// Leave `claim` out of the built claim set
    pub fn without_claim(mut self, claim: &str) -> Self {
        self.omitted.push(claim.to_string());
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        let mut claims = json!({
            "sub": self.sub,
            "token_use": self.token_use,
            "scope": self.scope,
            "iss": self.iss,
            "exp": self.exp,
            "iat": self.iat,
            "client_id": self.client_id,
            "username": self.username,
        });

        if let Some(nbf) = self.nbf {
            claims["nbf"] = json!(nbf);
        }

        if let Some(map) = claims.as_object_mut() {
            for claim in &self.omitted {
                map.remove(claim);
            }
        }

        claims
    }

    /// Build and sign with `key`
    pub fn sign_with(self, key: &TestSigningKey) -> String {
        key.sign(&self.build())
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace a token's payload while keeping its original header and signature.
pub fn tamper_payload(token: &str, claims: &Value) -> String {
    let parts: Vec<&str> = token.split('.').collect();
    assert_eq!(parts.len(), 3, "token should have three segments");

    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.{}", parts[0], payload, parts[2])
}
