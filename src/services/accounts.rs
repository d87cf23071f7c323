// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account registration, login and session token lifecycle.

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::db::UserStore;
use crate::error::{AppError, Result};
use crate::models::{User, UserProfile};
use crate::services::tokens::{TokenKind, TokenPair, TokenService};
use crate::time_utils::now_rfc3339;

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
    tokens: TokenService,
    bcrypt_cost: u32,
    /// Hash checked against when the username is unknown.
    dummy_hash: Arc<OnceCell<String>>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserStore>, tokens: TokenService, bcrypt_cost: u32) -> Self {
        Self {
            users,
            tokens,
            bcrypt_cost,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// Create an account and return its id. Input shape is validated by the route.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<String> {
        let password_hash = hash_password(password, self.bcrypt_cost).await?;

        let user = User {
            id: mongodb::bson::oid::ObjectId::new().to_hex(),
            username: username.to_string(),
            email: email.to_lowercase(),
            password_hash,
            is_active: true,
            last_login: None,
            created_at: now_rfc3339(),
        };

        let id = self.users.register(&user).await?;
        tracing::info!(user_id = %id, username, "User registered");
        Ok(id)
    }

    /// Check credentials and hand out a fresh token pair.
    pub async fn login(&self, username: &str, password: &str) -> Result<(String, TokenPair)> {
        let Some(user) = self.users.find_by_username(username).await? else {
            // Unknown usernames cost the same bcrypt work as wrong passwords.
            let dummy = self
                .dummy_hash
                .get_or_try_init(|| hash_password("not-a-real-password", self.bcrypt_cost))
                .await?;
            verify_password(password, dummy).await?;
            tracing::warn!(username, "Login rejected: unknown user");
            return Err(AppError::Unauthorized);
        };

        if !verify_password(password, &user.password_hash).await? {
            tracing::warn!(username, "Login rejected: bad password");
            return Err(AppError::Unauthorized);
        }
        if !user.is_active {
            tracing::warn!(user_id = %user.id, "Login rejected: inactive account");
            return Err(AppError::Unauthorized);
        }

        let tokens = self.tokens.issue_pair(&user.id)?;
        self.users.touch_last_login(&user.id, &now_rfc3339()).await?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok((user.id, tokens))
    }

    pub async fn profile(&self, user_id: &str) -> Result<UserProfile> {
        self.users
            .find_by_id(user_id)
            .await?
            .map(UserProfile::from)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }

    /// Revoke both tokens of a session. Neither is revoked unless both are
    /// readable.
    pub async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<()> {
        self.tokens.revoke_all(&[access_token, refresh_token]).await
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String> {
        let claims = self.tokens.verify(refresh_token, TokenKind::Refresh).await?;

        let user = self
            .users
            .find_by_id(&claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)?;
        if !user.is_active {
            return Err(AppError::Unauthorized);
        }

        self.tokens.issue(&user.id, TokenKind::Access)
    }
}

async fn hash_password(password: &str, cost: u32) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Hashing task failed: {}", e)))?
        .map_err(|e| AppError::Internal(anyhow::anyhow!("bcrypt hash: {}", e)))
}

async fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Hashing task failed: {}", e)))?
        .map_err(|e| AppError::Internal(anyhow::anyhow!("bcrypt verify: {}", e)))
}
