//! # Authorizer Test Utilities
//!
//! Shared test utilities for the token authorizer.
//!
//! This crate provides:
//! - Deterministic signing keys (fixed RSA keys, seeded Ed25519 keys) and their JWKs
//! - A test token builder with provider-shaped claims
//! - A mock JWKS server on wiremock
//! - Fixed test vectors (usernames, client IDs, known-bad tokens)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use authorizer_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let key = TestSigningKey::rsa_primary();
//!     let server = MockJwksServer::serving(&[&key]).await;
//!
//!     let token = TestTokenBuilder::new().for_user("alice").sign_with(&key);
//!     // validate `token` against `server.jwks_url()`
//! }
//! ```

pub mod crypto_fixtures;
pub mod server_harness;
pub mod test_vectors;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use test_vectors::*;
pub use token_builders::*;
