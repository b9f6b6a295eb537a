// SPDX-License-Identifier: MIT

//! Bearer-token identity for the public API
//!
//! The engine only needs an owner id. Tokens are HS256 JWTs carrying
//! `{id, name, iat, nbf, exp}`.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::common::{self, CalcError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: i64,
    pub name: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

/// Signing and verification keys derived from one shared secret
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    /// Fails with `Config` when `ttl_secs` does not fit a token lifetime
    pub fn new(secret: &str, ttl_secs: u64) -> common::Result<Self> {
        let ttl = i64::try_from(ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| CalcError::config(format!("token TTL {}s is out of range", ttl_secs)))?;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        })
    }

    /// Mint a token for `owner_id`
    pub fn issue(&self, owner_id: i64, name: &str) -> common::Result<String> {
        let now = Utc::now();
        let expires = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| CalcError::config("token expiry is out of range"))?;
        let claims = Claims {
            id: owner_id,
            name: name.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expires.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| CalcError::Other(format!("failed to sign token: {}", e)))
    }

    /// Check signature and expiry, returning the owner id
    pub fn verify(&self, token: &str) -> common::Result<i64> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_nbf = true;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims.id)
            .map_err(|e| CalcError::unauthorized(format!("invalid token: {}", e)))
    }
}

/// The authenticated caller's owner id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner(pub i64);

impl FromRequestParts<AppState> for Owner {
    type Rejection = CalcError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| CalcError::unauthorized("authorization header is required"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| CalcError::unauthorized("expected a bearer token"))?;

        state.keys.verify(token.trim()).map(Owner)
    }
}
