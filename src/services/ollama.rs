// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ollama HTTP API client.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::gateway::{ChunkStream, GatewayError, ModelGateway};
use crate::models::{Message, ModelInfo};

const CHUNK_CHANNEL_CAPACITY: usize = 32;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
}

/// Body of a non-streaming reply, and of each NDJSON line when streaming.
#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    message: Option<ReplyMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct TagsReply {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
    #[serde(default)]
    size: u64,
}

/// Client for a local Ollama runtime.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_chat(
        &self,
        messages: &[Message],
        model: &str,
        stream: bool,
    ) -> Result<Response, GatewayError> {
        let url = format!("{}/api/chat", self.base_url);
        let request = ChatRequest {
            model,
            messages,
            stream,
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        check_status(response).await
    }
}

async fn check_status(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GatewayError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Interpret one NDJSON line of a streaming reply.
///
/// Returns the text fragment (possibly empty), whether the reply is done, or
/// the error the runtime reported.
fn parse_stream_line(line: &str) -> Result<(String, bool), GatewayError> {
    let reply: ChatReply =
        serde_json::from_str(line).map_err(|e| GatewayError::Decode(e.to_string()))?;
    if let Some(error) = reply.error {
        return Err(GatewayError::Upstream(error));
    }
    let text = reply.message.map(|m| m.content).unwrap_or_default();
    Ok((text, reply.done))
}

/// Turns the raw bytes of a streaming reply into text fragments.
///
/// Lines can straddle transport chunks, including in the middle of a
/// multi-byte character, so bytes are held until a newline arrives and only
/// whole lines are decoded. Nothing is yielded after the final `done` line
/// or the first error.
#[derive(Debug, Default)]
struct StreamDecoder {
    pending: Vec<u8>,
    done: bool,
}

impl StreamDecoder {
    fn feed(&mut self, bytes: &[u8]) -> Vec<Result<String, GatewayError>> {
        let mut out = Vec::new();
        if self.done {
            return out;
        }
        self.pending.extend_from_slice(bytes);

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(item) = self.decode(&line) {
                out.push(item);
            }
            if self.done {
                break;
            }
        }
        out
    }

    /// Flush a trailing line that had no newline.
    fn finish(&mut self) -> Option<Result<String, GatewayError>> {
        if self.done {
            return None;
        }
        let tail = std::mem::take(&mut self.pending);
        let item = self.decode(&tail);
        self.done = true;
        item
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn decode(&mut self, line: &[u8]) -> Option<Result<String, GatewayError>> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match parse_stream_line(line) {
            Ok((text, done)) => {
                self.done = done;
                (!text.is_empty()).then_some(Ok(text))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[async_trait]
impl ModelGateway for OllamaClient {
    async fn complete(&self, messages: &[Message], model: &str) -> Result<String, GatewayError> {
        let reply: ChatReply = self
            .post_chat(messages, model, false)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        if let Some(error) = reply.error {
            return Err(GatewayError::Upstream(error));
        }
        reply
            .message
            .map(|m| m.content)
            .ok_or_else(|| GatewayError::Decode("reply has no message".to_string()))
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        model: &str,
    ) -> Result<ChunkStream, GatewayError> {
        let response = self.post_chat(messages, model, true).await?;
        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);

        // Dropping the receiver stops the reader.
        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut decoder = StreamDecoder::default();

            while let Some(next) = body.next().await {
                let bytes = match next {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx.send(Err(GatewayError::Transport(e.to_string()))).await;
                        return;
                    }
                };
                for item in decoder.feed(&bytes) {
                    if tx.send(item).await.is_err() {
                        return;
                    }
                }
                if decoder.is_done() {
                    return;
                }
            }

            if let Some(item) = decoder.finish() {
                let _ = tx.send(item).await;
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, GatewayError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let tags: TagsReply = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        Ok(tags
            .models
            .into_iter()
            .map(|m| ModelInfo {
                name: m.name,
                size_bytes: m.size,
            })
            .collect())
    }
}
