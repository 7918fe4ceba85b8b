//! Bearer token verification.
//!
//! - `jwks` - key set resolver (HTTP)
//! - `cache` - key set caching with single-flight refresh
//! - `jwt` - token verifier
//! - `claims` - verified header and claim set
//! - `principal` - principal mapping

pub mod cache;
pub mod claims;
pub mod jwks;
pub mod jwt;
pub mod principal;

pub use cache::CachingKeySetSource;
pub use claims::{Claims, ParsedToken, TokenHeader};
pub use jwks::{HttpKeySetSource, Jwk, KeySet, KeySetSource};
pub use jwt::{TokenVerifier, VerificationPolicy};
pub use principal::{map_principal, PrincipalId};
