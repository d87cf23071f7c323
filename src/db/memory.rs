// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store backed by concurrent maps.
//!
//! Selected with `MONGO_URI=memory://`. Data lives as long as the process,
//! which makes it the backend of choice for tests and local demos.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{
    chat_not_found, email_taken, new_chat_id, username_taken, ChatStore, ConversationUpdate,
    RevocationStore, UserStore,
};
use crate::error::AppError;
use crate::models::chat::UNTITLED;
use crate::models::{Conversation, User};
use crate::time_utils::CreationClock;

type ChatKey = (String, String);

/// In-memory implementation of every store trait.
#[derive(Default)]
pub struct MemoryDb {
    users: DashMap<String, User>,
    /// username -> user id
    usernames: DashMap<String, String>,
    /// email -> user id
    emails: DashMap<String, String>,
    chats: DashMap<ChatKey, Conversation>,
    revoked: DashMap<String, DateTime<Utc>>,
    clock: CreationClock,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored conversations across all users.
    pub fn chat_count(&self) -> usize {
        self.chats.len()
    }

    /// Number of live revocation entries.
    pub fn revoked_count(&self) -> usize {
        self.revoked.len()
    }
}

fn chat_key(owner: &str, chat_id: &str) -> ChatKey {
    (owner.to_string(), chat_id.to_string())
}

// ─── Users ───────────────────────────────────────────────────

#[async_trait]
impl UserStore for MemoryDb {
    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        match self.usernames.entry(user.username.clone()) {
            Entry::Occupied(_) => return Err(username_taken()),
            Entry::Vacant(slot) => {
                slot.insert(user.id.clone());
            }
        }

        match self.emails.entry(user.email.clone()) {
            Entry::Occupied(_) => {
                self.usernames.remove(&user.username);
                return Err(email_taken());
            }
            Entry::Vacant(slot) => {
                slot.insert(user.id.clone());
            }
        }

        self.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let id = self.usernames.get(username).map(|id| id.clone());
        Ok(id.and_then(|id| self.users.get(&id).map(|u| u.clone())))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let id = self.emails.get(email).map(|id| id.clone());
        Ok(id.and_then(|id| self.users.get(&id).map(|u| u.clone())))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.get(id).map(|u| u.clone()))
    }

    async fn touch_last_login(&self, id: &str, at: &str) -> Result<(), AppError> {
        if let Some(mut user) = self.users.get_mut(id) {
            user.last_login = Some(at.to_string());
        }
        Ok(())
    }
}

// ─── Chats ───────────────────────────────────────────────────

#[async_trait]
impl ChatStore for MemoryDb {
    async fn upsert(&self, owner: &str, update: ConversationUpdate<'_>) -> Result<String, AppError> {
        if let Some(chat_id) = update.chat_id {
            if let Some(mut existing) = self.chats.get_mut(&chat_key(owner, chat_id)) {
                existing.messages = update.messages.to_vec();
                if let Some(title) = update.title {
                    existing.title = title.to_string();
                }
                return Ok(chat_id.to_string());
            }
        }

        loop {
            let chat_id = new_chat_id();
            if let Entry::Vacant(slot) = self.chats.entry(chat_key(owner, &chat_id)) {
                slot.insert(Conversation {
                    user_id: owner.to_string(),
                    chat_id: chat_id.clone(),
                    title: update.title.unwrap_or(UNTITLED).to_string(),
                    created_at: self.clock.next(),
                    model: update.model.to_string(),
                    messages: update.messages.to_vec(),
                });
                return Ok(chat_id);
            }
        }
    }

    async fn list_metadata(&self, owner: &str) -> Result<Vec<Conversation>, AppError> {
        let mut chats: Vec<Conversation> = self
            .chats
            .iter()
            .filter(|entry| entry.key().0 == owner)
            .map(|entry| entry.value().metadata())
            .collect();
        chats.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(chats)
    }

    async fn get(&self, owner: &str, chat_id: &str) -> Result<Option<Conversation>, AppError> {
        Ok(self
            .chats
            .get(&chat_key(owner, chat_id))
            .map(|c| c.clone()))
    }

    async fn rename(&self, owner: &str, chat_id: &str, title: &str) -> Result<(), AppError> {
        let mut chat = self
            .chats
            .get_mut(&chat_key(owner, chat_id))
            .ok_or_else(|| chat_not_found(owner, chat_id))?;
        chat.title = title.to_string();
        Ok(())
    }

    async fn delete(&self, owner: &str, chat_id: &str) -> Result<(), AppError> {
        self.chats
            .remove(&chat_key(owner, chat_id))
            .map(|_| ())
            .ok_or_else(|| chat_not_found(owner, chat_id))
    }
}

// ─── Revoked tokens ──────────────────────────────────────────

#[async_trait]
impl RevocationStore for MemoryDb {
    async fn revoke(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), AppError> {
        self.revoked.insert(token.to_string(), expires_at);
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> Result<bool, AppError> {
        Ok(self.revoked.contains_key(token))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let before = self.revoked.len();
        self.revoked.retain(|_, expires_at| *expires_at >= now);
        Ok((before - self.revoked.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;

    fn user(id: &str, username: &str, email: &str) -> User {
        User {
            id: id.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            is_active: true,
            last_login: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn update<'a>(chat_id: Option<&'a str>, title: Option<&'a str>, messages: &'a [Message]) -> ConversationUpdate<'a> {
        ConversationUpdate {
            chat_id,
            title,
            model: "llama3",
            messages,
        }
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_username_first() {
        let db = MemoryDb::new();
        db.register(&user("1", "alice", "alice@example.com"))
            .await
            .unwrap();

        let err = db
            .register(&user("2", "alice", "alice@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m.contains("Username")));

        let err = db
            .register(&user("3", "alice2", "alice@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m.contains("Email")));

        // The failed email claim must not leave the username reserved.
        assert!(db.find_by_username("alice2").await.unwrap().is_none());
        db.register(&user("4", "alice2", "other@example.com"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upsert_creates_then_overwrites() {
        let db = MemoryDb::new();
        let first = [Message::user("hi"), Message::assistant("hello")];
        let chat_id = db.upsert("u1", update(None, None, &first)).await.unwrap();

        let stored = db.get("u1", &chat_id).await.unwrap().unwrap();
        assert_eq!(stored.title, UNTITLED);
        assert_eq!(stored.messages.len(), 2);

        let second = [
            Message::user("hi"),
            Message::assistant("hello"),
            Message::user("again"),
            Message::assistant("sure"),
        ];
        let same_id = db
            .upsert("u1", update(Some(&chat_id), Some("Greetings"), &second))
            .await
            .unwrap();
        assert_eq!(same_id, chat_id);

        // Title omitted on the next write keeps the stored one.
        db.upsert("u1", update(Some(&chat_id), None, &second))
            .await
            .unwrap();

        let stored = db.get("u1", &chat_id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Greetings");
        assert_eq!(stored.messages, second);
        assert_eq!(db.list_metadata("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_unknown_id_allocates_fresh_one() {
        let db = MemoryDb::new();
        let messages = [Message::user("hi")];
        let chat_id = db
            .upsert("u1", update(Some("client01"), None, &messages))
            .await
            .unwrap();
        assert_ne!(chat_id, "client01");
        assert!(db.get("u1", "client01").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let db = MemoryDb::new();
        let messages = [Message::user("hi")];
        let mut created = Vec::new();
        for _ in 0..5 {
            created.push(db.upsert("u1", update(None, None, &messages)).await.unwrap());
        }
        created.reverse();

        let listed: Vec<String> = db
            .list_metadata("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.chat_id)
            .collect();
        assert_eq!(listed, created);
    }

    #[tokio::test]
    async fn test_chats_are_scoped_by_owner() {
        let db = MemoryDb::new();
        let messages = [Message::user("hi")];
        let chat_id = db.upsert("u1", update(None, None, &messages)).await.unwrap();

        assert!(db.get("u2", &chat_id).await.unwrap().is_none());
        assert!(matches!(
            db.rename("u2", &chat_id, "mine").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            db.delete("u2", &chat_id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(db.list_metadata("u2").await.unwrap().is_empty());

        db.delete("u1", &chat_id).await.unwrap();
        assert_eq!(db.chat_count(), 0);
    }

    #[tokio::test]
    async fn test_purge_expired_revocations() {
        let db = MemoryDb::new();
        let now = Utc::now();
        db.revoke("old", now - chrono::Duration::minutes(5))
            .await
            .unwrap();
        db.revoke("live", now + chrono::Duration::minutes(5))
            .await
            .unwrap();

        assert_eq!(db.purge_expired(now).await.unwrap(), 1);
        assert!(!db.is_revoked("old").await.unwrap());
        assert!(db.is_revoked("live").await.unwrap());
        assert_eq!(db.revoked_count(), 1);
    }
}
