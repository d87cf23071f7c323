// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Boundary to the model runtime.
//!
//! [`ModelGateway`] is what the completion endpoint and the streaming
//! session call; [`crate::services::OllamaClient`] is the production
//! implementation and [`ScriptedGateway`] replays canned output.

use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, Stream, StreamExt};

use crate::models::{Message, ModelInfo, Role};

/// Transient user turn appended when asking the model to name a conversation.
pub const TITLE_PROMPT: &str = "give a shortest title for this conversation under 8 words";

/// Longer conversations keep whatever title they already have.
const TITLE_MAX_MESSAGES: usize = 4;

/// Incremental completion output. An `Err` item ends the stream.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, GatewayError>> + Send>>;

/// Model runtime failures, all reported to clients as "upstream unavailable".
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("failed to reach model service: {0}")]
    Transport(String),

    #[error("model service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model service error: {0}")]
    Upstream(String),

    #[error("unexpected model service response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Whole-response completion. Not retried on failure.
    async fn complete(&self, messages: &[Message], model: &str) -> Result<String, GatewayError>;

    /// Chunked completion. The stream is finite and not restartable.
    async fn complete_stream(
        &self,
        messages: &[Message],
        model: &str,
    ) -> Result<ChunkStream, GatewayError>;

    async fn list_models(&self) -> Result<Vec<ModelInfo>, GatewayError>;

    /// Ask the model for a short conversation title.
    ///
    /// Only short conversations that end with an assistant reply are named.
    /// Any failure yields `None`.
    async fn title_for(&self, messages: &[Message], model: &str) -> Option<String> {
        if messages.len() > TITLE_MAX_MESSAGES
            || messages.last().map(|m| m.role) != Some(Role::Assistant)
        {
            return None;
        }

        let mut prompt = messages.to_vec();
        prompt.push(Message::user(TITLE_PROMPT));

        match self.complete(&prompt, model).await {
            Ok(text) => {
                let title = text.replace('"', "");
                let title = title.trim();
                (!title.is_empty()).then(|| title.to_string())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Title generation failed");
                None
            }
        }
    }
}

// ─── Scripted gateway ────────────────────────────────────────

/// Gateway that replays configured output without a model runtime.
///
/// Clones share their call counters.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGateway {
    reply: String,
    title: Option<String>,
    chunks: Vec<String>,
    fail_after: Option<usize>,
    unavailable: bool,
    chunk_delay: Duration,
    models: Vec<ModelInfo>,
    complete_calls: Arc<AtomicUsize>,
    stream_calls: Arc<AtomicUsize>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text returned by `complete` for ordinary prompts.
    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = reply.into();
        self
    }

    /// Text returned for title prompts. Without one, title requests fail.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_chunks<I, S>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chunks = chunks.into_iter().map(Into::into).collect();
        self
    }

    /// End the stream with an error after `n` chunks.
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Fail every call as if the runtime were down.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Pause before each chunk, leaving room to interrupt.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub fn with_models(mut self, models: Vec<ModelInfo>) -> Self {
        self.models = models;
        self
    }

    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    fn down() -> GatewayError {
        GatewayError::Transport("connection refused".to_string())
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn complete(&self, messages: &[Message], _model: &str) -> Result<String, GatewayError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(Self::down());
        }

        let is_title_prompt = messages
            .last()
            .is_some_and(|m| m.role == Role::User && m.content == TITLE_PROMPT);
        if is_title_prompt {
            return self
                .title
                .clone()
                .ok_or_else(|| GatewayError::Upstream("no title scripted".to_string()));
        }
        Ok(self.reply.clone())
    }

    async fn complete_stream(
        &self,
        _messages: &[Message],
        _model: &str,
    ) -> Result<ChunkStream, GatewayError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(Self::down());
        }

        let mut items: Vec<Result<String, GatewayError>> = match self.fail_after {
            Some(n) => self.chunks.iter().take(n).cloned().map(Ok).collect(),
            None => self.chunks.iter().cloned().map(Ok).collect(),
        };
        if self.fail_after.is_some() {
            items.push(Err(GatewayError::Upstream("model crashed".to_string())));
        }

        let delay = self.chunk_delay;
        Ok(Box::pin(stream::iter(items).then(move |item| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            item
        })))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, GatewayError> {
        if self.unavailable {
            return Err(Self::down());
        }
        Ok(self.models.clone())
    }
}
