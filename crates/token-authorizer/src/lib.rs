//! Token Authorizer Library
//!
//! Verifies bearer tokens issued by an external identity provider and derives
//! the principal identifier `"{username}|{client_id}"` from the verified
//! claims, for use by a request authorization layer.
//!
//! # Pipeline
//!
//! ```text
//! validator -> auth/jwt.rs -> auth/cache.rs -> auth/jwks.rs
//!                          -> auth/principal.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - key set resolution, token verification, principal mapping
//! - `config` - validator configuration from environment
//! - `errors` - classified validation errors
//! - `observability` - metrics definitions
//! - `validator` - the validation facade

pub mod auth;
pub mod config;
pub mod errors;
pub mod observability;
pub mod validator;

pub use auth::principal::PrincipalId;
pub use config::{ConfigError, ValidatorConfig};
pub use errors::{Rejection, ValidationError, ValidationStep};
pub use validator::{validate, TokenValidator};
