// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Non-streaming completions and model listing.

use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::Result;
use crate::middleware::auth::optional_identity;
use crate::models::chat::format_size;
use crate::models::Message;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/chat/completions", post(completions))
        .route("/api/v1/chat/models", get(models))
}

// ─── Completions ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CompletionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub response: String,
}

/// Whole-response completion. Signed-in callers get the exchange saved.
async fn completions(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(body): Json<CompletionRequest>,
) -> Result<Json<CompletionResponse>> {
    let user = optional_identity(&state, &jar, &headers).await?;
    let chat_id = body.chat_id.as_deref().filter(|id| !id.is_empty());

    let outcome = state
        .chat_service
        .complete(
            user.as_ref().map(|u| u.user_id.as_str()),
            body.messages,
            chat_id,
            body.model.as_deref(),
        )
        .await?;

    Ok(Json(CompletionResponse {
        chat_id: outcome.chat_id,
        title: outcome.title,
        response: outcome.response,
    }))
}

// ─── Models ──────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ModelEntry {
    pub name: String,
    /// Human-readable size, e.g. `"4.1 GB"`
    pub size: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ModelsResponse {
    pub models: Vec<ModelEntry>,
    pub total: usize,
}

async fn models(State(state): State<Arc<AppState>>) -> Result<Json<ModelsResponse>> {
    let models: Vec<ModelEntry> = state
        .chat_service
        .available_models()
        .await?
        .into_iter()
        .map(|m| ModelEntry {
            name: m.name,
            size: format_size(m.size_bytes),
        })
        .collect();

    Ok(Json(ModelsResponse {
        total: models.len(),
        models,
    }))
}
