// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end tests of the chat socket over a real listener.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

mod common;
use common::{create_test_app, create_test_app_with, default_gateway, register_and_login};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Serve `app` on an ephemeral port and return its address.
async fn serve(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr.to_string()
}

async fn connect(addr: &str, token: Option<&str>) -> Socket {
    let url = match token {
        Some(token) => format!("ws://{}/ws/chat?token={}", addr, token),
        None => format!("ws://{}/ws/chat", addr),
    };
    let (socket, _) = connect_async(url).await.unwrap();
    socket
}

async fn next_frame(socket: &mut Socket) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for frame")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(_) = message {
            return serde_json::from_str(message.to_text().unwrap()).unwrap();
        }
    }
}

async fn send_frame(socket: &mut Socket, frame: Value) {
    socket
        .send(Message::Text(frame.to_string().into()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_anonymous_stream() {
    let (app, _) = create_test_app();
    let addr = serve(app).await;
    let mut socket = connect(&addr, None).await;

    assert_eq!(next_frame(&mut socket).await, json!({"status": "connected"}));

    send_frame(
        &mut socket,
        json!({"messages": [{"role": "user", "content": "hi"}]}),
    )
    .await;
    assert_eq!(next_frame(&mut socket).await, json!({"status": "start"}));

    let mut streamed = String::new();
    let complete = loop {
        let frame = next_frame(&mut socket).await;
        match frame["status"].as_str().unwrap() {
            "streaming" => streamed.push_str(frame["chunk"].as_str().unwrap()),
            _ => break frame,
        }
    };
    assert_eq!(
        complete,
        json!({"status": "complete", "message": "Hello from the model"})
    );
    assert_eq!(streamed, "Hello from the model");

    socket.close(None).await.unwrap();
}

#[tokio::test]
async fn test_authenticated_stream_is_saved() {
    let (app, state) = create_test_app();
    let (user_id, token, _) = register_and_login(&app, "alice").await;
    let addr = serve(app).await;
    let mut socket = connect(&addr, Some(&token)).await;

    assert_eq!(next_frame(&mut socket).await["status"], "connected");
    send_frame(
        &mut socket,
        json!({"command": "chat", "messages": [{"role": "user", "content": "hi"}]}),
    )
    .await;

    let saved = loop {
        let frame = next_frame(&mut socket).await;
        if frame["status"] == "saved" {
            break frame;
        }
        assert_ne!(frame["status"], "error", "unexpected error: {}", frame);
    };
    assert_eq!(saved["title"], "Friendly greeting");

    let chat_id = saved["chat_id"].as_str().unwrap();
    let stored = state.chat_service.get(&user_id, chat_id).await.unwrap();
    assert_eq!(stored.messages.len(), 2);
    assert_eq!(stored.messages[1].content, "Hello from the model");
}

#[tokio::test]
async fn test_bearer_header_identifies_socket() {
    let (app, state) = create_test_app();
    let (user_id, token, _) = register_and_login(&app, "carol").await;
    let addr = serve(app).await;

    let mut request = format!("ws://{}/ws/chat", addr)
        .into_client_request()
        .unwrap();
    request.headers_mut().insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
    let (mut socket, _) = connect_async(request).await.unwrap();

    assert_eq!(next_frame(&mut socket).await["status"], "connected");
    send_frame(
        &mut socket,
        json!({"messages": [{"role": "user", "content": "hi"}]}),
    )
    .await;

    let saved = loop {
        let frame = next_frame(&mut socket).await;
        if frame["status"] == "saved" {
            break frame;
        }
        assert_ne!(frame["status"], "error", "unexpected error: {}", frame);
    };

    let chats = state.chat_service.list(&user_id).await.unwrap();
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].chat_id, saved["chat_id"].as_str().unwrap());
}

#[tokio::test]
async fn test_invalid_token_connects_anonymously() {
    let (app, state) = create_test_app();
    let (user_id, _, _) = register_and_login(&app, "bob").await;
    let addr = serve(app).await;
    let mut socket = connect(&addr, Some("garbage")).await;

    assert_eq!(next_frame(&mut socket).await["status"], "connected");
    send_frame(
        &mut socket,
        json!({"messages": [{"role": "user", "content": "hi"}]}),
    )
    .await;
    loop {
        let frame = next_frame(&mut socket).await;
        assert_ne!(frame["status"], "saved");
        if frame["status"] == "complete" {
            break;
        }
    }

    assert!(state.chat_service.list(&user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_interrupt_over_socket() {
    let gateway = default_gateway().with_chunk_delay(Duration::from_millis(100));
    let (app, state) = create_test_app_with(gateway);
    let (user_id, token, _) = register_and_login(&app, "carol").await;
    let addr = serve(app).await;
    let mut socket = connect(&addr, Some(&token)).await;

    assert_eq!(next_frame(&mut socket).await["status"], "connected");

    // Interrupt with nothing running is silent.
    send_frame(&mut socket, json!({"command": "interrupt"})).await;

    send_frame(
        &mut socket,
        json!({"messages": [{"role": "user", "content": "long story"}]}),
    )
    .await;
    assert_eq!(next_frame(&mut socket).await, json!({"status": "start"}));
    send_frame(&mut socket, json!({"command": "interrupt"})).await;

    let cancelled = loop {
        let frame = next_frame(&mut socket).await;
        if frame["status"] != "streaming" {
            break frame;
        }
    };
    assert_eq!(
        cancelled,
        json!({"status": "interrupted", "message": "Generation was cancelled"})
    );
    assert_eq!(
        next_frame(&mut socket).await,
        json!({"status": "interrupted", "content": "Response generation interrupted"})
    );

    assert!(state.chat_service.list(&user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_bad_frames_keep_socket_open() {
    let (app, _) = create_test_app();
    let addr = serve(app).await;
    let mut socket = connect(&addr, None).await;

    assert_eq!(next_frame(&mut socket).await["status"], "connected");

    socket
        .send(Message::Text("{not json".to_string().into()))
        .await
        .unwrap();
    assert_eq!(next_frame(&mut socket).await["status"], "error");

    send_frame(
        &mut socket,
        json!({"messages": [{"role": "assistant", "content": "hi"}]}),
    )
    .await;
    assert_eq!(
        next_frame(&mut socket).await,
        json!({"status": "error", "message": "Last message must be from the user"})
    );

    // Still serving.
    send_frame(
        &mut socket,
        json!({"messages": [{"role": "user", "content": "hi"}]}),
    )
    .await;
    assert_eq!(next_frame(&mut socket).await["status"], "start");
}
