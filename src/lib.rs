// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Chatbot backend: accounts, chat history and streamed completions
//!
//! This crate provides the HTTP and WebSocket API in front of a local
//! Ollama runtime, with users and conversations kept in MongoDB.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use std::sync::Arc;

use config::Config;
use db::{ChatStore, RevocationStore, UserStore};
use services::{AccountService, ChatService, GenerationPool, ModelGateway, TokenService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub tokens: TokenService,
    pub accounts: AccountService,
    pub chat_service: ChatService,
    pub generation_pool: GenerationPool,
}

impl AppState {
    /// Wire the services over the given stores and model gateway.
    pub fn new<S>(config: Config, store: Arc<S>, gateway: Arc<dyn ModelGateway>) -> Self
    where
        S: UserStore + ChatStore + RevocationStore + 'static,
    {
        let tokens = TokenService::new(&config, store.clone());
        let accounts = AccountService::new(store.clone(), tokens.clone(), config.bcrypt_cost);
        let chat_service = ChatService::new(store, gateway, config.default_model.clone());
        let generation_pool = GenerationPool::new(config.generation_concurrency);

        Self {
            config,
            tokens,
            accounts,
            chat_service,
            generation_pool,
        }
    }
}
