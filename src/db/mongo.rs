// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! MongoDB client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (credential records, unique username/email)
//! - Chats (conversations keyed by owner + chat id)
//! - Revoked tokens (logout list, reaped by a TTL index)

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::{self, doc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};

use super::{
    chat_not_found, collections, email_taken, new_chat_id, username_taken, ChatStore,
    ConversationUpdate, RevocationStore, UserStore,
};
use crate::error::AppError;
use crate::models::chat::UNTITLED;
use crate::models::{Conversation, User};
use crate::time_utils::CreationClock;

const DUPLICATE_KEY: i32 = 11000;
// A fresh chat id colliding with an existing one is rare; give up after a few.
const CHAT_ID_ATTEMPTS: usize = 5;

/// Revocation entry as stored. `expires_at` is a BSON date so the TTL
/// index can act on it.
#[derive(Debug, Serialize, Deserialize)]
struct RevokedTokenDoc {
    token: String,
    expires_at: bson::DateTime,
}

/// MongoDB database client.
#[derive(Clone)]
pub struct MongoDb {
    db: Database,
    clock: Arc<CreationClock>,
}

impl MongoDb {
    /// Connect and make sure the indexes the stores rely on exist.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, AppError> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        let db = Self {
            db: client.database(db_name),
            clock: Arc::new(CreationClock::new()),
        };
        db.ensure_indexes().await?;

        tracing::info!(database = db_name, "Connected to MongoDB");
        Ok(db)
    }

    fn users(&self) -> Collection<User> {
        self.db.collection(collections::USERS)
    }

    fn chats(&self) -> Collection<Conversation> {
        self.db.collection(collections::CHATS)
    }

    fn revoked(&self) -> Collection<RevokedTokenDoc> {
        self.db.collection(collections::REVOKED_TOKENS)
    }

    async fn ensure_indexes(&self) -> Result<(), AppError> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.users()
            .create_indexes([
                IndexModel::builder()
                    .keys(doc! { "username": 1 })
                    .options(unique())
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique())
                    .build(),
            ])
            .await
            .map_err(db_err)?;

        self.chats()
            .create_indexes([
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "chat_id": 1 })
                    .options(unique())
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "created_at": -1 })
                    .build(),
            ])
            .await
            .map_err(db_err)?;

        self.revoked()
            .create_indexes([
                IndexModel::builder()
                    .keys(doc! { "token": 1 })
                    .options(unique())
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "expires_at": 1 })
                    .options(
                        IndexOptions::builder()
                            .expire_after(Duration::from_secs(0))
                            .build(),
                    )
                    .build(),
            ])
            .await
            .map_err(db_err)?;

        Ok(())
    }
}

fn db_err(e: mongodb::error::Error) -> AppError {
    AppError::Database(e.to_string())
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(
        e.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY
    )
}

// ─── User Operations ─────────────────────────────────────────

#[async_trait]
impl UserStore for MongoDb {
    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        match self.users().insert_one(user).await {
            Ok(_) => Ok(()),
            // Lost a race with a concurrent registration: report which key clashed.
            Err(e) if is_duplicate_key(&e) => {
                if self.find_by_username(&user.username).await?.is_some() {
                    Err(username_taken())
                } else {
                    Err(email_taken())
                }
            }
            Err(e) => Err(db_err(e)),
        }
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        self.users()
            .find_one(doc! { "username": username })
            .await
            .map_err(db_err)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.users()
            .find_one(doc! { "email": email })
            .await
            .map_err(db_err)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        self.users()
            .find_one(doc! { "_id": id })
            .await
            .map_err(db_err)
    }

    async fn touch_last_login(&self, id: &str, at: &str) -> Result<(), AppError> {
        self.users()
            .update_one(doc! { "_id": id }, doc! { "$set": { "last_login": at } })
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

// ─── Chat Operations ─────────────────────────────────────────

#[async_trait]
impl ChatStore for MongoDb {
    async fn upsert(&self, owner: &str, update: ConversationUpdate<'_>) -> Result<String, AppError> {
        let messages = bson::to_bson(update.messages)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Encoding messages failed: {}", e)))?;

        if let Some(chat_id) = update.chat_id {
            let mut set = doc! { "messages": messages };
            if let Some(title) = update.title {
                set.insert("title", title);
            }

            let result = self
                .chats()
                .update_one(
                    doc! { "user_id": owner, "chat_id": chat_id },
                    doc! { "$set": set },
                )
                .await
                .map_err(db_err)?;

            if result.matched_count > 0 {
                return Ok(chat_id.to_string());
            }
            tracing::debug!(
                user_id = owner,
                chat_id,
                "Chat not found, creating a new one"
            );
        }

        for _ in 0..CHAT_ID_ATTEMPTS {
            let conversation = Conversation {
                user_id: owner.to_string(),
                chat_id: new_chat_id(),
                title: update.title.unwrap_or(UNTITLED).to_string(),
                created_at: self.clock.next(),
                model: update.model.to_string(),
                messages: update.messages.to_vec(),
            };

            match self.chats().insert_one(&conversation).await {
                Ok(_) => return Ok(conversation.chat_id),
                Err(e) if is_duplicate_key(&e) => continue,
                Err(e) => return Err(db_err(e)),
            }
        }

        Err(AppError::Database(
            "Could not allocate a unique chat id".to_string(),
        ))
    }

    async fn list_metadata(&self, owner: &str) -> Result<Vec<Conversation>, AppError> {
        self.chats()
            .find(doc! { "user_id": owner })
            .projection(doc! { "messages": 0 })
            // ObjectId `_id`s increase per process, breaking created_at ties.
            .sort(doc! { "created_at": -1, "_id": -1 })
            .await
            .map_err(db_err)?
            .try_collect()
            .await
            .map_err(db_err)
    }

    async fn get(&self, owner: &str, chat_id: &str) -> Result<Option<Conversation>, AppError> {
        self.chats()
            .find_one(doc! { "user_id": owner, "chat_id": chat_id })
            .await
            .map_err(db_err)
    }

    async fn rename(&self, owner: &str, chat_id: &str, title: &str) -> Result<(), AppError> {
        let result = self
            .chats()
            .update_one(
                doc! { "user_id": owner, "chat_id": chat_id },
                doc! { "$set": { "title": title } },
            )
            .await
            .map_err(db_err)?;

        if result.matched_count == 0 {
            return Err(chat_not_found(owner, chat_id));
        }
        Ok(())
    }

    async fn delete(&self, owner: &str, chat_id: &str) -> Result<(), AppError> {
        let result = self
            .chats()
            .delete_one(doc! { "user_id": owner, "chat_id": chat_id })
            .await
            .map_err(db_err)?;

        if result.deleted_count == 0 {
            return Err(chat_not_found(owner, chat_id));
        }
        Ok(())
    }
}

// ─── Revoked Token Operations ────────────────────────────────

#[async_trait]
impl RevocationStore for MongoDb {
    async fn revoke(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), AppError> {
        let expires_at = bson::DateTime::from_millis(expires_at.timestamp_millis());
        self.revoked()
            .update_one(
                doc! { "token": token },
                doc! { "$set": { "expires_at": expires_at } },
            )
            .upsert(true)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> Result<bool, AppError> {
        let entry = self
            .revoked()
            .find_one(doc! { "token": token })
            .await
            .map_err(db_err)?;
        Ok(entry.is_some())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let now = bson::DateTime::from_millis(now.timestamp_millis());
        let result = self
            .revoked()
            .delete_many(doc! { "expires_at": { "$lt": now } })
            .await
            .map_err(db_err)?;
        Ok(result.deleted_count)
    }
}
