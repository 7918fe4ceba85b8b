//! JWT claims structure.
//!
//! Contains the claims extracted from verified tokens. The `sub` and
//! `username` fields are redacted in Debug output to prevent exposure in logs.

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Claim set of a verified token.
///
/// Standard claims plus the custom claims a hosted user pool puts in access
/// tokens. Custom claims default to empty when the provider omits them or
/// sends `null`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - redacted in Debug output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Issuer URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Not-before timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// OAuth client the token was issued to.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub client_id: String,

    /// User name of the signed-in user - redacted in Debug output.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub username: String,

    /// Space-separated scopes granted to this token.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub scope: String,

    /// Provider token kind ("access" or "id").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_use: Option<String>,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &"[REDACTED]")
            .field("iss", &self.iss)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("nbf", &self.nbf)
            .field("client_id", &self.client_id)
            .field("username", &"[REDACTED]")
            .field("scope", &self.scope)
            .field("token_use", &self.token_use)
            .finish()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Header of a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    pub alg: Algorithm,
    pub kid: String,
    pub typ: Option<String>,
}

/// A token whose signature and claims have been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedToken {
    pub header: TokenHeader,
    pub claims: Claims,
}
