//! Mock JWKS server for tests
//!
//! Wraps a wiremock server that publishes a key set at
//! `/.well-known/jwks.json`, or any canned response a test needs.

use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::crypto_fixtures::TestSigningKey;

/// Path the key set is published under.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// A wiremock server standing in for an identity provider's key endpoint.
pub struct MockJwksServer {
    server: MockServer,
}

impl MockJwksServer {
    /// Start a server with nothing mounted (every request gets a 404).
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Start a server publishing `keys`.
    pub async fn serving(keys: &[&TestSigningKey]) -> Self {
        let server = Self::start().await;
        server.publish(keys).await;
        server
    }

    /// Publish `keys` at [`JWKS_PATH`].
    pub async fn publish(&self, keys: &[&TestSigningKey]) {
        self.respond_with(ResponseTemplate::new(200).set_body_json(TestSigningKey::jwks_json(keys)))
            .await;
    }

    /// Publish a raw JSON document at [`JWKS_PATH`].
    pub async fn publish_json(&self, body: Value) {
        self.respond_with(ResponseTemplate::new(200).set_body_json(body))
            .await;
    }

    /// Answer [`JWKS_PATH`] with an arbitrary response.
    pub async fn respond_with(&self, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Drop all mounted responses and recorded requests.
    ///
    /// Use before publishing a new key set to simulate rotation.
    pub async fn reset(&self) {
        self.server.reset().await;
    }

    /// Full URL of the key set endpoint.
    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Number of requests received since start or the last reset.
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }

    /// Underlying wiremock server, for custom expectations.
    pub fn server(&self) -> &MockServer {
        &self.server
    }
}
