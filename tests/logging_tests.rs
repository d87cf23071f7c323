// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request logging must never carry credentials.

use std::io;
use std::sync::{Arc, Mutex};

mod common;
use common::{create_test_app, register_and_login, request, send};

/// Log sink shared between the subscriber and the test.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn json_subscriber(sink: Captured) -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_max_level(tracing::Level::TRACE)
        .with_writer(move || sink.clone())
        .finish()
}

#[tokio::test]
async fn test_socket_query_token_is_not_logged() {
    let (app, _) = create_test_app();
    let (_, access, _) = register_and_login(&app, "alice").await;

    let logs = Captured::default();
    let _guard = tracing::subscriber::set_default(json_subscriber(logs.clone()));

    send(
        &app,
        request("GET", &format!("/ws/chat?token={}", access), None, None),
    )
    .await;

    let output = logs.contents();
    assert!(output.contains("/ws/chat"), "request was not logged: {}", output);
    assert!(!output.contains(&access), "token leaked into logs: {}", output);
    assert!(!output.contains("token="), "query leaked into logs: {}", output);
}

#[tokio::test]
async fn test_bearer_header_is_masked_in_logs() {
    let (app, _) = create_test_app();
    let (_, access, _) = register_and_login(&app, "bob").await;

    let logs = Captured::default();
    let _guard = tracing::subscriber::set_default(json_subscriber(logs.clone()));

    send(&app, request("GET", "/api/v1/auth/me", Some(&access), None)).await;

    let output = logs.contents();
    assert!(output.contains("Bearer ***"), "request was not logged: {}", output);
    assert!(!output.contains(&access), "token leaked into logs: {}", output);
}
