// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Streaming chat session.
//!
//! A [`ChatSession`] owns one WebSocket connection's command loop and at
//! most one generation task. The transport is abstracted into a stream of
//! [`Inbound`] items and a channel of [`ServerFrame`]s, so the route only
//! moves bytes and the state machine can be driven directly in tests.
//!
//! Cancellation is cooperative: the generation checks its token while
//! waiting for a pool slot, while opening the stream, at every chunk
//! boundary and whenever it waits on a full outbound channel.

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::models::chat::validate_prompt;
use crate::models::{ClientFrame, Command, Message, ServerFrame};
use crate::services::chat::ChatService;
use crate::services::pool::GenerationPool;

/// What the transport delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Close,
}

/// How a generation task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Cancelled,
    Failed(String),
    /// The outbound channel closed under the task.
    Disconnected,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("client disconnected")]
    Disconnected,

    #[error("generation task failed: {0}")]
    Task(#[from] JoinError),
}

struct Generation {
    cancel: CancellationToken,
    handle: JoinHandle<Outcome>,
}

pub struct ChatSession {
    chat: ChatService,
    pool: GenerationPool,
    owner: Option<String>,
    outbound: mpsc::Sender<ServerFrame>,
    active: Option<Generation>,
}

impl ChatSession {
    /// `owner` is the authenticated user, or `None` for an anonymous session.
    pub fn new(
        chat: ChatService,
        pool: GenerationPool,
        owner: Option<String>,
        outbound: mpsc::Sender<ServerFrame>,
    ) -> Self {
        Self {
            chat,
            pool,
            owner,
            outbound,
            active: None,
        }
    }

    /// Drive the session until the client goes away.
    ///
    /// Any generation still running when the loop ends is cancelled and
    /// awaited before returning.
    pub async fn run<S>(mut self, inbound: S) -> Result<(), SessionError>
    where
        S: Stream<Item = Inbound>,
    {
        tokio::pin!(inbound);

        let result = match self.send(ServerFrame::Connected).await {
            Ok(()) => loop {
                match inbound.next().await {
                    Some(Inbound::Text(text)) => {
                        if let Err(e) = self.handle_text(&text).await {
                            break Err(e);
                        }
                    }
                    Some(Inbound::Close) | None => break Ok(()),
                }
            },
            Err(e) => Err(e),
        };

        if let Some(generation) = self.active.take() {
            generation.cancel.cancel();
            let _ = generation.handle.await;
        }

        tracing::debug!(user_id = ?self.owner, "Chat session closed");
        result
    }

    async fn handle_text(&mut self, text: &str) -> Result<(), SessionError> {
        let frame: ClientFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(error = %e, "Unparseable client frame");
                return self
                    .send(ServerFrame::error(format!("Invalid message: {}", e)))
                    .await;
            }
        };

        match frame.command {
            Command::Interrupt => self.interrupt().await,
            Command::Chat => self.start_chat(frame).await,
        }
    }

    async fn interrupt(&mut self) -> Result<(), SessionError> {
        let Some(generation) = self.active.take() else {
            return Ok(());
        };

        match self.stop(generation).await? {
            Outcome::Cancelled => self.send(ServerFrame::interrupt_ack()).await,
            // Already finished before the interrupt landed.
            _ => Ok(()),
        }
    }

    async fn start_chat(&mut self, frame: ClientFrame) -> Result<(), SessionError> {
        if let Err(reason) = validate_prompt(&frame.messages) {
            return self.send(ServerFrame::error(reason)).await;
        }

        if let Some(previous) = self.active.take() {
            self.stop(previous).await?;
        }

        let cancel = CancellationToken::new();
        let job = GenerationJob {
            chat: self.chat.clone(),
            pool: self.pool.clone(),
            owner: self.owner.clone(),
            model: self.chat.model_or_default(frame.model.as_deref()),
            chat_id: frame.chat_id().map(str::to_string),
            messages: frame.messages,
            outbound: self.outbound.clone(),
            cancel: cancel.clone(),
        };

        tracing::debug!(
            user_id = ?self.owner,
            model = %job.model,
            messages = job.messages.len(),
            "Starting generation"
        );

        self.active = Some(Generation {
            cancel,
            handle: tokio::spawn(job.run()),
        });
        Ok(())
    }

    /// Cancel a generation and wait for it to wind down.
    async fn stop(&self, generation: Generation) -> Result<Outcome, SessionError> {
        generation.cancel.cancel();
        match generation.handle.await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::error!(error = %e, "Generation task panicked");
                let _ = self
                    .send(ServerFrame::error("Internal error during generation"))
                    .await;
                Err(SessionError::Task(e))
            }
        }
    }

    async fn send(&self, frame: ServerFrame) -> Result<(), SessionError> {
        self.outbound
            .send(frame)
            .await
            .map_err(|_| SessionError::Disconnected)
    }
}

/// One streamed completion, run as its own task.
struct GenerationJob {
    chat: ChatService,
    pool: GenerationPool,
    owner: Option<String>,
    messages: Vec<Message>,
    chat_id: Option<String>,
    model: String,
    outbound: mpsc::Sender<ServerFrame>,
    cancel: CancellationToken,
}

impl GenerationJob {
    async fn run(self) -> Outcome {
        let mut text = String::new();
        let outcome = match self.deliver(ServerFrame::Start).await {
            Ok(()) => self.generate(&mut text).await,
            Err(outcome) => outcome,
        };

        let last = match &outcome {
            Outcome::Completed => ServerFrame::Complete {
                message: text.clone(),
            },
            Outcome::Cancelled => ServerFrame::cancelled(),
            Outcome::Failed(reason) => ServerFrame::error(reason.clone()),
            Outcome::Disconnected => return Outcome::Disconnected,
        };
        if let Err(interrupted) = self.deliver(last).await {
            return interrupted;
        }

        if outcome == Outcome::Cancelled {
            return outcome;
        }
        if let Some(owner) = self.owner.as_deref().filter(|_| !text.is_empty()) {
            self.persist(owner, text).await;
        }
        outcome
    }

    /// Queue a frame for the client, giving up once the generation is
    /// cancelled. A client that stops reading fills the channel, and
    /// `stop()` must still be able to reap the task.
    async fn deliver(&self, frame: ServerFrame) -> Result<(), Outcome> {
        tokio::select! {
            biased;
            sent = self.outbound.send(frame) => sent.map_err(|_| Outcome::Disconnected),
            _ = self.cancel.cancelled() => Err(Outcome::Cancelled),
        }
    }

    async fn generate(&self, text: &mut String) -> Outcome {
        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Outcome::Cancelled,
            permit = self.pool.acquire() => match permit {
                Ok(permit) => permit,
                Err(e) => return Outcome::Failed(e.to_string()),
            },
        };

        let gateway = self.chat.gateway();
        let mut chunks = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Outcome::Cancelled,
            opened = gateway.complete_stream(&self.messages, &self.model) => match opened {
                Ok(chunks) => chunks,
                Err(e) => {
                    tracing::warn!(error = %e, model = %self.model, "Failed to open completion stream");
                    return Outcome::Failed(e.to_string());
                }
            },
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Outcome::Cancelled,
                next = chunks.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    text.push_str(&chunk);
                    if let Err(outcome) = self.deliver(ServerFrame::Streaming { chunk }).await {
                        return outcome;
                    }
                    tokio::task::yield_now().await;
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, model = %self.model, "Completion stream failed");
                    return Outcome::Failed(e.to_string());
                }
                None => return Outcome::Completed,
            }
        }
    }

    async fn persist(&self, owner: &str, text: String) {
        let mut messages = self.messages.clone();
        messages.push(Message::assistant(text));

        let frame = match self
            .chat
            .persist_exchange(owner, self.chat_id.as_deref(), &self.model, &messages)
            .await
        {
            Ok(saved) => ServerFrame::Saved {
                chat_id: saved.chat_id,
                title: saved.title,
            },
            Err(e) => {
                tracing::error!(error = %e, user_id = owner, "Failed to save conversation");
                ServerFrame::error("Failed to save conversation")
            }
        };
        let _ = self.deliver(frame).await;
    }
}
