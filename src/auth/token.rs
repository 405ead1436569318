//! Self-contained session tokens
//!
//! HS256 JWTs carrying `{username, exp}` with `exp` in epoch milliseconds.
//! The library's own `exp` handling assumes seconds, so expiry is checked
//! here instead.

use anyhow::{Context, Result};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::now_millis;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub username: String,
    /// Epoch milliseconds
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifetime_ms: i64,
}

impl TokenSigner {
    pub fn new(secret: &str, lifetime: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifetime_ms: i64::try_from(lifetime.as_millis()).unwrap_or(i64::MAX),
        }
    }

    pub fn issue(&self, username: &str) -> Result<String> {
        self.issue_at(username, now_millis())
    }

    pub fn issue_at(&self, username: &str, now_ms: i64) -> Result<String> {
        let claims = SessionClaims {
            username: username.to_string(),
            exp: now_ms.saturating_add(self.lifetime_ms),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .context("failed to sign session token")
    }

    pub fn verify(&self, token: &str) -> Option<SessionClaims> {
        self.verify_at(token, now_millis())
    }

    /// Malformed, forged and expired tokens all yield `None`
    pub fn verify_at(&self, token: &str, now_ms: i64) -> Option<SessionClaims> {
        let claims = decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .ok()?
            .claims;
        (claims.exp > now_ms).then_some(claims)
    }
}
