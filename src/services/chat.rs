// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Chat completion and conversation history.

use std::sync::Arc;

use crate::db::{ChatStore, ConversationUpdate};
use crate::error::{AppError, Result};
use crate::models::chat::validate_prompt;
use crate::models::{Conversation, Message, ModelInfo};
use crate::services::gateway::ModelGateway;

/// Result of a non-streaming completion.
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    /// Set only when the exchange was stored for a user.
    pub chat_id: Option<String>,
    pub title: Option<String>,
    pub response: String,
}

/// Where a finished exchange was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedChat {
    pub chat_id: String,
    pub title: Option<String>,
}

/// Completion orchestration on top of the model gateway and the chat store.
#[derive(Clone)]
pub struct ChatService {
    chats: Arc<dyn ChatStore>,
    gateway: Arc<dyn ModelGateway>,
    default_model: String,
}

impl ChatService {
    pub fn new(
        chats: Arc<dyn ChatStore>,
        gateway: Arc<dyn ModelGateway>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            chats,
            gateway,
            default_model: default_model.into(),
        }
    }

    pub fn gateway(&self) -> &Arc<dyn ModelGateway> {
        &self.gateway
    }

    /// `model`, unless it is missing or blank.
    pub fn model_or_default(&self, model: Option<&str>) -> String {
        model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.default_model.as_str())
            .to_string()
    }

    /// Run a whole-response completion, storing the exchange when `owner` is set.
    pub async fn complete(
        &self,
        owner: Option<&str>,
        mut messages: Vec<Message>,
        chat_id: Option<&str>,
        model: Option<&str>,
    ) -> Result<CompletionOutcome> {
        validate_prompt(&messages).map_err(AppError::BadRequest)?;
        let model = self.model_or_default(model);

        let response = self.gateway.complete(&messages, &model).await?;
        messages.push(Message::assistant(response.clone()));

        let Some(owner) = owner else {
            return Ok(CompletionOutcome {
                chat_id: None,
                title: None,
                response,
            });
        };

        let saved = self
            .persist_exchange(owner, chat_id, &model, &messages)
            .await?;

        Ok(CompletionOutcome {
            chat_id: Some(saved.chat_id),
            title: saved.title,
            response,
        })
    }

    /// Name the conversation if it is still short, then upsert it.
    pub async fn persist_exchange(
        &self,
        owner: &str,
        chat_id: Option<&str>,
        model: &str,
        messages: &[Message],
    ) -> Result<SavedChat> {
        let title = self
            .gateway
            .title_for(messages, &self.default_model)
            .await;

        let chat_id = self
            .chats
            .upsert(
                owner,
                ConversationUpdate {
                    chat_id,
                    title: title.as_deref(),
                    model,
                    messages,
                },
            )
            .await?;

        tracing::debug!(
            user_id = owner,
            chat_id = %chat_id,
            messages = messages.len(),
            "Conversation saved"
        );

        Ok(SavedChat { chat_id, title })
    }

    // ─── History ─────────────────────────────────────────────

    pub async fn list(&self, owner: &str) -> Result<Vec<Conversation>> {
        self.chats.list_metadata(owner).await
    }

    pub async fn get(&self, owner: &str, chat_id: &str) -> Result<Conversation> {
        self.chats
            .get(owner, chat_id)
            .await?
            .ok_or_else(|| crate::db::chat_not_found(owner, chat_id))
    }

    pub async fn rename(&self, owner: &str, chat_id: &str, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::BadRequest("Title must not be empty".to_string()));
        }
        self.chats.rename(owner, chat_id, title).await
    }

    pub async fn delete(&self, owner: &str, chat_id: &str) -> Result<()> {
        self.chats.delete(owner, chat_id).await
    }

    pub async fn available_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(self.gateway.list_models().await?)
    }
}
