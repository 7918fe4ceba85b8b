//! Principal mapping.
//!
//! A verified token is reduced to a single principal identifier,
//! `"{username}|{client_id}"`, which downstream authorization keys on.

use crate::auth::claims::{Claims, ParsedToken};
use std::fmt;

/// Separator between the username and client ID.
pub const PRINCIPAL_SEPARATOR: char = '|';

/// Principal identifier derived from a verified token.
///
/// Missing claims map to empty components, so a token without a username
/// yields `"|{client_id}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Build an identifier from its two components.
    pub fn new(username: &str, client_id: &str) -> Self {
        Self(format!("{username}{PRINCIPAL_SEPARATOR}{client_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Claims> for PrincipalId {
    fn from(claims: &Claims) -> Self {
        Self::new(&claims.username, &claims.client_id)
    }
}

impl From<PrincipalId> for String {
    fn from(principal: PrincipalId) -> Self {
        principal.0
    }
}

/// Map a verified token to its principal. Never fails.
pub fn map_principal(token: &ParsedToken) -> PrincipalId {
    PrincipalId::from(&token.claims)
}
