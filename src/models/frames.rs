// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON frames exchanged on the chat WebSocket.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use super::chat::Message;

pub const INTERRUPT_ACK: &str = "Response generation interrupted";
pub const GENERATION_CANCELLED: &str = "Generation was cancelled";

/// Command carried by an inbound frame. Frames without one are chats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    #[default]
    Chat,
    Interrupt,
}

/// Frame sent by the client.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ClientFrame {
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "\"chat\" | \"interrupt\""))]
    pub command: Command,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
}

impl ClientFrame {
    /// Chat id supplied by the client, ignoring empty strings.
    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Frame sent by the server, tagged by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ServerFrame {
    Connected,
    Start,
    Streaming {
        chunk: String,
    },
    Complete {
        message: String,
    },
    /// Emitted twice on a client interrupt: by the generation (`message`)
    /// and as the acknowledgement of the command (`content`).
    Interrupted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    /// The finished exchange was stored for the authenticated user.
    Saved {
        chat_id: String,
        title: Option<String>,
    },
    Error {
        message: String,
    },
}

impl ServerFrame {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Acknowledgement of an `interrupt` command.
    pub fn interrupt_ack() -> Self {
        Self::Interrupted {
            message: None,
            content: Some(INTERRUPT_ACK.to_string()),
        }
    }

    /// Final frame of a generation that was cancelled.
    pub fn cancelled() -> Self {
        Self::Interrupted {
            message: Some(GENERATION_CANCELLED.to_string()),
            content: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_defaults_to_chat() {
        let frame: ClientFrame =
            serde_json::from_value(json!({"messages": [{"role": "user", "content": "hi"}]}))
                .unwrap();
        assert_eq!(frame.command, Command::Chat);
        assert_eq!(frame.messages.len(), 1);
        assert!(frame.chat_id().is_none());
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(serde_json::from_value::<ClientFrame>(json!({"command": "dance"})).is_err());
    }

    #[test]
    fn test_empty_chat_id_ignored() {
        let frame: ClientFrame =
            serde_json::from_value(json!({"command": "chat", "chat_id": ""})).unwrap();
        assert!(frame.chat_id().is_none());
    }

    #[test]
    fn test_server_frame_wire_format() {
        assert_eq!(
            serde_json::to_value(ServerFrame::Connected).unwrap(),
            json!({"status": "connected"})
        );
        assert_eq!(
            serde_json::to_value(ServerFrame::Streaming {
                chunk: "He".to_string()
            })
            .unwrap(),
            json!({"status": "streaming", "chunk": "He"})
        );
        assert_eq!(
            serde_json::to_value(ServerFrame::interrupt_ack()).unwrap(),
            json!({"status": "interrupted", "content": INTERRUPT_ACK})
        );
        assert_eq!(
            serde_json::to_value(ServerFrame::cancelled()).unwrap(),
            json!({"status": "interrupted", "message": GENERATION_CANCELLED})
        );
    }
}
