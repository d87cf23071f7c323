// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer.
//!
//! Handlers and services talk to the stores through the traits below so the
//! MongoDB backend and the in-process backend are interchangeable.

pub mod memory;
pub mod mongo;

pub use memory::MemoryDb;
pub use mongo::MongoDb;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;

use crate::error::AppError;
use crate::models::{Conversation, Message, User};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const CHATS: &str = "chats";
    pub const REVOKED_TOKENS: &str = "revoked_tokens";
}

const CHAT_ID_LEN: usize = 8;

/// Generate a fresh chat identifier (8 ASCII alphanumerics).
pub fn new_chat_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(CHAT_ID_LEN)
        .map(char::from)
        .collect()
}

/// Credential records, unique by username and by email.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new record. Fails with `Conflict` if the username or email
    /// is already taken (username is reported first).
    async fn insert_user(&self, user: &User) -> Result<(), AppError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError>;

    async fn touch_last_login(&self, id: &str, at: &str) -> Result<(), AppError>;

    /// Check both unique keys, username first, then insert.
    async fn register(&self, user: &User) -> Result<String, AppError> {
        if self.find_by_username(&user.username).await?.is_some() {
            return Err(username_taken());
        }
        if self.find_by_email(&user.email).await?.is_some() {
            return Err(email_taken());
        }
        self.insert_user(user).await?;
        Ok(user.id.clone())
    }
}

pub(crate) fn username_taken() -> AppError {
    AppError::Conflict("Username already registered".to_string())
}

pub(crate) fn email_taken() -> AppError {
    AppError::Conflict("Email already registered".to_string())
}

/// Content written by [`ChatStore::upsert`].
#[derive(Debug, Clone, Copy)]
pub struct ConversationUpdate<'a> {
    /// Existing chat to overwrite. Unknown ids are treated as absent.
    pub chat_id: Option<&'a str>,
    /// New title; `None` keeps the stored one (or "Untitled" on create).
    pub title: Option<&'a str>,
    pub model: &'a str,
    pub messages: &'a [Message],
}

/// Conversation records keyed by (owner, chat id).
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Overwrite the messages of an existing conversation, or create a new
    /// one under a freshly generated id. Returns the id actually stored.
    async fn upsert(&self, owner: &str, update: ConversationUpdate<'_>) -> Result<String, AppError>;

    /// All conversations of `owner`, newest first, with `messages` empty.
    async fn list_metadata(&self, owner: &str) -> Result<Vec<Conversation>, AppError>;

    async fn get(&self, owner: &str, chat_id: &str) -> Result<Option<Conversation>, AppError>;

    /// Fails with `NotFound` when the conversation does not exist.
    async fn rename(&self, owner: &str, chat_id: &str, title: &str) -> Result<(), AppError>;

    /// Fails with `NotFound` when the conversation does not exist.
    async fn delete(&self, owner: &str, chat_id: &str) -> Result<(), AppError>;
}

pub(crate) fn chat_not_found(owner: &str, chat_id: &str) -> AppError {
    AppError::NotFound(format!(
        "Chat '{}' not found for user '{}'",
        chat_id, owner
    ))
}

/// Tokens invalidated by logout, kept until their own expiry.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Record `token` as revoked. Revoking twice is harmless.
    async fn revoke(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), AppError>;

    async fn is_revoked(&self, token: &str) -> Result<bool, AppError>;

    /// Drop entries whose `expires_at` is before `now`. Returns how many went.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}
