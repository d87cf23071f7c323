// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod chat;
pub mod frames;
pub mod user;

pub use chat::{Conversation, Message, ModelInfo, Role};
pub use frames::{ClientFrame, Command, ServerFrame};
pub use user::{User, UserProfile};
