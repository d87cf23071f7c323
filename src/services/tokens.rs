// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bearer token issuing, verification and revocation.
//!
//! Tokens are HS256 JWTs. Verification consults the revocation store before
//! looking at the token itself, so a logged-out token reports `Revoked`
//! even once it has also expired.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::db::RevocationStore;
use crate::error::AppError;
use crate::time_utils::from_unix_seconds;

/// Which of the two token lifetimes a token was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Random token ID, so two tokens issued in the same second differ
    pub jti: String,
    pub kind: TokenKind,
}

/// Why a presented token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("expired")]
    Expired,
    #[error("malformed")]
    Malformed,
    #[error("revoked")]
    Revoked,
}

/// Access + refresh token pair handed out at login.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    revoked: Arc<dyn RevocationStore>,
}

impl TokenService {
    pub fn new(config: &Config, revoked: Arc<dyn RevocationStore>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(&config.jwt_signing_key),
            decoding: DecodingKey::from_secret(&config.jwt_signing_key),
            access_ttl: Duration::minutes(config.access_token_ttl_minutes),
            refresh_ttl: Duration::days(config.refresh_token_ttl_days),
            revoked,
        }
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    /// Issue a token with the configured lifetime for `kind`.
    pub fn issue(&self, subject: &str, kind: TokenKind) -> Result<String, AppError> {
        self.issue_with_ttl(subject, kind, self.ttl(kind))
    }

    pub fn issue_with_ttl(
        &self,
        subject: &str,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            iat: u64::try_from(now).unwrap_or(0),
            exp: u64::try_from(now + ttl.num_seconds()).unwrap_or(0),
            jti: format!("{:016x}", rand::random::<u64>()),
            kind,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))
    }

    pub fn issue_pair(&self, subject: &str) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: self.issue(subject, TokenKind::Access)?,
            refresh_token: self.issue(subject, TokenKind::Refresh)?,
        })
    }

    fn decode(&self, token: &str, check_expiry: bool) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = check_expiry;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })
    }

    /// Verify a token of the given kind and return its claims.
    ///
    /// Order: revocation, then signature/structure/expiry, then kind.
    pub async fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, AppError> {
        if self.revoked.is_revoked(token).await? {
            return Err(TokenError::Revoked.into());
        }

        let claims = self.decode(token, true)?;
        if claims.kind != kind {
            return Err(TokenError::Malformed.into());
        }
        Ok(claims)
    }

    /// When a revocation entry for `token` may be dropped. Expired tokens
    /// still qualify; unreadable ones do not.
    fn revocation_expiry(&self, token: &str) -> Result<DateTime<Utc>, TokenError> {
        let claims = self.decode(token, false)?;
        from_unix_seconds(claims.exp).ok_or(TokenError::Malformed)
    }

    /// Put a token on the revocation list until its own expiry.
    pub async fn revoke(&self, token: &str) -> Result<(), AppError> {
        let expires_at = self.revocation_expiry(token)?;
        self.revoked.revoke(token, expires_at).await
    }

    /// Revoke every token, or none of them if any is unreadable.
    pub async fn revoke_all(&self, tokens: &[&str]) -> Result<(), AppError> {
        let mut entries = Vec::with_capacity(tokens.len());
        for token in tokens {
            entries.push((*token, self.revocation_expiry(token)?));
        }
        for (token, expires_at) in entries {
            self.revoked.revoke(token, expires_at).await?;
        }
        Ok(())
    }

    /// Remove revocation entries for tokens that have expired anyway.
    pub async fn purge_expired(&self) -> Result<u64, AppError> {
        self.revoked.purge_expired(Utc::now()).await
    }
}
