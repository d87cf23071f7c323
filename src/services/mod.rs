// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod accounts;
pub mod chat;
pub mod gateway;
pub mod ollama;
pub mod pool;
pub mod session;
pub mod sweeper;
pub mod tokens;

pub use accounts::AccountService;
pub use chat::{ChatService, CompletionOutcome, SavedChat};
pub use gateway::{GatewayError, ModelGateway, ScriptedGateway};
pub use ollama::OllamaClient;
pub use pool::GenerationPool;
pub use session::{ChatSession, Inbound, SessionError};
pub use sweeper::spawn_revocation_sweeper;
pub use tokens::{Claims, TokenError, TokenKind, TokenPair, TokenService};
