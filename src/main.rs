// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Chatbot API Server
//!
//! Serves account, history and completion endpoints plus the streaming
//! chat socket, backed by MongoDB and a local Ollama runtime.

use chatbot_backend::{
    config::Config,
    db::{MemoryDb, MongoDb},
    services::{spawn_revocation_sweeper, ModelGateway, OllamaClient},
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting chatbot API");

    let gateway: Arc<dyn ModelGateway> = Arc::new(
        OllamaClient::new(
            &config.ollama_url,
            Duration::from_secs(config.ollama_timeout_secs),
        )
        .expect("Failed to build Ollama client"),
    );
    tracing::info!(
        url = %config.ollama_url,
        model = %config.default_model,
        "Ollama client initialized"
    );

    let state = if config.uses_memory_store() {
        tracing::warn!("Using in-memory store; data is lost on restart");
        AppState::new(config.clone(), Arc::new(MemoryDb::new()), gateway)
    } else {
        let db = MongoDb::connect(&config.mongo_uri, &config.mongo_db)
            .await
            .expect("Failed to connect to MongoDB");
        tracing::info!(database = %config.mongo_db, "MongoDB connected");
        AppState::new(config.clone(), Arc::new(db), gateway)
    };
    let state = Arc::new(state);

    spawn_revocation_sweeper(
        state.tokens.clone(),
        Duration::from_secs(config.revocation_sweep_secs.max(1)),
    );

    // Build router
    let app = chatbot_backend::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chatbot_backend=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
