// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Streaming chat over WebSocket.
//!
//! The route only moves frames between the socket and a [`ChatSession`];
//! the command handling lives in the session.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
    routing::get,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::middleware::auth::socket_identity;
use crate::models::ServerFrame;
use crate::services::{ChatSession, Inbound, SessionError};
use crate::AppState;

/// Frames buffered for a slow client before generation backs off.
const OUTBOUND_CAPACITY: usize = 64;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/ws/chat", get(chat_socket))
}

#[derive(Debug, Deserialize)]
pub struct SocketParams {
    #[serde(default)]
    pub token: Option<String>,
}

async fn chat_socket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<SocketParams>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Response {
    let owner = socket_identity(&state, params.token.as_deref(), &jar, &headers)
        .await
        .map(|user| user.user_id);

    ws.on_upgrade(move |socket| serve_socket(socket, state, owner))
}

async fn serve_socket(socket: WebSocket, state: Arc<AppState>, owner: Option<String>) {
    tracing::info!(user_id = ?owner, "Chat socket connected");

    let (mut sink, stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerFrame>(OUTBOUND_CAPACITY);

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode server frame");
                    continue;
                }
            };
            if sink.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let inbound = stream.filter_map(|message| async move {
        match message {
            Ok(WsMessage::Text(text)) => Some(Inbound::Text(text.as_str().to_owned())),
            Ok(WsMessage::Close(_)) | Err(_) => Some(Inbound::Close),
            // Pings are answered by axum; binary frames are not part of the protocol.
            Ok(_) => None,
        }
    });

    let session = ChatSession::new(
        state.chat_service.clone(),
        state.generation_pool.clone(),
        owner,
        tx,
    );

    match session.run(inbound).await {
        Ok(()) | Err(SessionError::Disconnected) => {}
        Err(e) => tracing::error!(error = %e, "Chat session ended with an error"),
    }

    // The session dropped its sender, so the writer drains and stops.
    let _ = writer.await;
    tracing::info!("Chat socket closed");
}
