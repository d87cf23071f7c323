// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honoured for local development.

use std::env;
use std::str::FromStr;

/// Prefix of `MONGO_URI` that selects the in-process store instead of MongoDB.
pub const MEMORY_STORE_URI: &str = "memory://";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Server ---
    /// Server port
    pub port: u16,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,

    // --- Storage ---
    /// MongoDB connection string (or `memory://` for the in-process store)
    pub mongo_uri: String,
    /// MongoDB database name
    pub mongo_db: String,

    // --- Model runtime ---
    /// Base URL of the Ollama HTTP API
    pub ollama_url: String,
    /// Model used when a request does not name one; also used for titles
    pub default_model: String,
    /// Transport timeout for Ollama calls
    pub ollama_timeout_secs: u64,
    /// Number of generations allowed to stream from Ollama at once
    pub generation_concurrency: usize,

    // --- Auth ---
    /// JWT signing key (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    /// bcrypt cost factor for password hashes
    pub bcrypt_cost: u32,
    /// Interval between sweeps of expired revocation entries
    pub revocation_sweep_secs: u64,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            port: 8000,
            frontend_url: "http://localhost:5173".to_string(),
            mongo_uri: MEMORY_STORE_URI.to_string(),
            mongo_db: "chatbot_test".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            default_model: "llama3".to_string(),
            ollama_timeout_secs: 300,
            generation_concurrency: 4,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            access_token_ttl_minutes: 30,
            refresh_token_ttl_days: 7,
            // Lowest cost bcrypt accepts, keeps tests fast.
            bcrypt_cost: 4,
            revocation_sweep_secs: 3600,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            port: parse_or("PORT", 8000)?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),

            mongo_uri: env::var("MONGO_URI")
                .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
            mongo_db: env::var("MONGO_DB").unwrap_or_else(|_| "chatbot".to_string()),

            ollama_url: env::var("OLLAMA_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            default_model: env::var("DEFAULT_MODEL").unwrap_or_else(|_| "llama3".to_string()),
            ollama_timeout_secs: parse_or("OLLAMA_TIMEOUT_SECS", 300)?,
            generation_concurrency: parse_or("GENERATION_CONCURRENCY", 4)?,

            jwt_signing_key: env::var("SECRET_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("SECRET_KEY"))?
                .into_bytes(),
            access_token_ttl_minutes: parse_or("ACCESS_TOKEN_EXPIRE_MINUTES", 30)?,
            refresh_token_ttl_days: parse_or("REFRESH_TOKEN_EXPIRE_DAYS", 7)?,
            bcrypt_cost: parse_or("BCRYPT_COST", 10)?,
            revocation_sweep_secs: parse_or("REVOCATION_SWEEP_SECS", 3600)?,
        })
    }

    /// True when `MONGO_URI` selects the in-process store.
    pub fn uses_memory_store(&self) -> bool {
        self.mongo_uri.starts_with(MEMORY_STORE_URI)
    }
}

/// Read an optional variable, falling back to `default` when unset.
/// A value that is set but unparseable is an error rather than silently ignored.
fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
