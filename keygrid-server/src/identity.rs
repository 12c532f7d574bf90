//! Bearer-token identity resolution.
//!
//! The registry trusts whatever user id the identity collaborator
//! supplies; this module is the seam where that collaborator plugs in.
//! The shipped implementation verifies HS256 JWTs whose claims carry a
//! user id (`sub`), a token kind (`type`, must be `access`) and an expiry
//! (`exp`). Token issuance is someone else's job.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use keygrid_types::UserId;
use serde::Deserialize;
use std::collections::HashMap;

/// Resolves a bearer token to a verified user id.
pub trait IdentityProvider: Send + Sync {
    /// Returns the user id for a valid token, `None` otherwise.
    fn authenticate(&self, token: &str) -> Option<UserId>;
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(rename = "type", default)]
    kind: String,
}

/// Identity provider backed by HS256 JWT verification.
pub struct JwtIdentity {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtIdentity {
    /// Creates a provider verifying tokens signed with `secret`.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl IdentityProvider for JwtIdentity {
    fn authenticate(&self, token: &str) -> Option<UserId> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).ok()?;
        // Refresh tokens must not grant API access.
        if data.claims.kind != "access" {
            return None;
        }
        data.claims.sub.parse::<i64>().ok().map(UserId::new)
    }
}

/// Fixed token-to-user map (for tests and local development).
#[derive(Debug, Default)]
pub struct StaticIdentity {
    tokens: HashMap<String, UserId>,
}

impl StaticIdentity {
    /// Creates an empty provider that rejects everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a token for a user.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, user_id: UserId) -> Self {
        self.tokens.insert(token.into(), user_id);
        self
    }
}

impl IdentityProvider for StaticIdentity {
    fn authenticate(&self, token: &str) -> Option<UserId> {
        self.tokens.get(token).copied()
    }
}
