// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chatbot_backend::config::Config;
use chatbot_backend::db::MemoryDb;
use chatbot_backend::routes::create_router;
use chatbot_backend::services::ScriptedGateway;
use chatbot_backend::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Check if a MongoDB test server is configured.
#[allow(dead_code)]
pub fn mongo_available() -> bool {
    std::env::var("MONGO_TEST_URI").is_ok()
}

/// Skip test with message if no MongoDB test server is configured.
#[macro_export]
macro_rules! require_mongo {
    () => {
        if !crate::common::mongo_available() {
            eprintln!("⚠️  Skipping: MONGO_TEST_URI not set");
            return;
        }
    };
}

/// Gateway used by most API tests.
#[allow(dead_code)]
pub fn default_gateway() -> ScriptedGateway {
    ScriptedGateway::new()
        .with_reply("Hello from the model")
        .with_title("Friendly greeting")
        .with_chunks(["Hello", " from", " the", " model"])
}

/// Create a test app over the in-memory store and a scripted gateway.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app_with(gateway: ScriptedGateway) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(
        Config::default(),
        Arc::new(MemoryDb::new()),
        Arc::new(gateway),
    ));
    (create_router(state.clone()), state)
}

#[allow(dead_code)]
pub fn create_test_app() -> (Router, Arc<AppState>) {
    create_test_app_with(default_gateway())
}

/// Build a request with an optional bearer token and JSON body.
#[allow(dead_code)]
pub fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Send a request and decode the JSON response (Null for an empty body).
#[allow(dead_code)]
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

/// Register `username` and log in. Returns (user_id, access_token, refresh_token).
#[allow(dead_code)]
pub async fn register_and_login(app: &Router, username: &str) -> (String, String, String) {
    let (status, body) = send(
        app,
        request(
            "POST",
            "/api/v1/auth/register",
            None,
            Some(json!({
                "username": username,
                "email": format!("{}@example.com", username),
                "password": "password123",
                "confirm_password": "password123"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
    let user_id = body["user_id"].as_str().unwrap().to_string();

    let (status, body) = send(
        app,
        request(
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({"username": username, "password": "password123"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);

    (
        user_id,
        body["access_token"].as_str().unwrap().to_string(),
        body["refresh_token"].as_str().unwrap().to_string(),
    )
}
