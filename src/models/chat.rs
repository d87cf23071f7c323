// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Conversation models shared by the stores, the model gateway and the API.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Title given to conversations that have not been named yet.
pub const UNTITLED: &str = "Untitled";

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Conversation record stored in the `chats` collection.
///
/// Keyed by (`user_id`, `chat_id`). Bulk listings return the record with
/// `messages` left empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Conversation {
    pub user_id: String,
    pub chat_id: String,
    pub title: String,
    /// Creation time (RFC3339, `Z` suffix, so it sorts lexicographically)
    pub created_at: String,
    pub model: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Copy of this record without its messages.
    pub fn metadata(&self) -> Self {
        Self {
            messages: Vec::new(),
            ..self.clone()
        }
    }
}

/// Check that a message list can be sent to the model: it must be
/// non-empty and end with a user turn.
pub fn validate_prompt(messages: &[Message]) -> Result<(), String> {
    match messages.last() {
        None => Err("Messages must not be empty".to_string()),
        Some(last) if last.role != Role::User => {
            Err("Last message must be from the user".to_string())
        }
        Some(_) => Ok(()),
    }
}

/// Model installed in the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    pub size_bytes: u64,
}

/// Render a byte count the way model sizes are shown to users (`"4.1 GB"`).
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
