// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Conversation history routes (require authentication).

use axum::{
    extract::{Path, State},
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::Conversation;
use crate::AppState;

/// The auth middleware is applied in routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/chat/history", get(list_history))
        .route(
            "/api/v1/chat/history/{chat_id}",
            get(get_conversation)
                .patch(rename_conversation)
                .delete(delete_conversation),
        )
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct HistoryResponse {
    pub user_id: String,
    /// Newest first, without messages
    pub chats: Vec<Conversation>,
}

async fn list_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<HistoryResponse>> {
    let chats = state.chat_service.list(&user.user_id).await?;
    Ok(Json(HistoryResponse {
        user_id: user.user_id,
        chats,
    }))
}

async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(chat_id): Path<String>,
) -> Result<Json<Conversation>> {
    Ok(Json(state.chat_service.get(&user.user_id, &chat_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub title: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RenameResponse {
    pub chat_id: String,
    pub title: String,
    pub success: bool,
}

async fn rename_conversation(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(chat_id): Path<String>,
    Json(body): Json<RenameRequest>,
) -> Result<Json<RenameResponse>> {
    let title = body.title.trim().to_string();
    state
        .chat_service
        .rename(&user.user_id, &chat_id, &title)
        .await?;

    tracing::info!(user_id = %user.user_id, chat_id = %chat_id, "Conversation renamed");
    Ok(Json(RenameResponse {
        chat_id,
        title,
        success: true,
    }))
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteResponse {
    pub chat_id: String,
    pub success: bool,
}

async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(chat_id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    state.chat_service.delete(&user.user_id, &chat_id).await?;

    tracing::info!(user_id = %user.user_id, chat_id = %chat_id, "Conversation deleted");
    Ok(Json(DeleteResponse {
        chat_id,
        success: true,
    }))
}
