// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT wire-format tests.
//!
//! These tests pin the claims layout so tokens stay readable by any HS256
//! client holding the key, and check that the API rejects tokens signed
//! elsewhere or past their expiry.

use axum::http::StatusCode;
use chatbot_backend::config::Config;
use chatbot_backend::services::TokenKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

mod common;
use common::{create_test_app, register_and_login, request, send};

/// Claims as an external HS256 client sees them.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: u64,
    iat: u64,
    jti: String,
    kind: String,
}

#[tokio::test]
async fn test_issued_token_is_plain_hs256() {
    let (_, state) = create_test_app();
    let token = state.tokens.issue("user-42", TokenKind::Refresh).unwrap();

    let key = DecodingKey::from_secret(&Config::default().jwt_signing_key);
    let data = decode::<Claims>(&token, &key, &Validation::new(Algorithm::HS256))
        .expect("token should decode with the shared key");

    assert_eq!(data.header.alg, Algorithm::HS256);
    assert_eq!(data.claims.sub, "user-42");
    assert_eq!(data.claims.kind, "refresh");
    assert!(!data.claims.jti.is_empty());
    assert_eq!(data.claims.exp - data.claims.iat, 7 * 24 * 60 * 60);
}

#[tokio::test]
async fn test_token_signed_with_other_key_is_rejected() {
    let (app, state) = create_test_app();
    let (user_id, _, _) = register_and_login(&app, "mallory").await;

    let now = chrono::Utc::now().timestamp() as u64;
    let forged = encode(
        &Header::new(Algorithm::HS256),
        &Claims {
            sub: user_id,
            exp: now + 600,
            iat: now,
            jti: "forged".to_string(),
            kind: "access".to_string(),
        },
        &EncodingKey::from_secret(b"some_other_key_32_bytes_long!!!!"),
    )
    .unwrap();
    assert!(state.tokens.verify(&forged, TokenKind::Access).await.is_err());

    let (status, body) = send(&app, request("GET", "/api/v1/auth/me", Some(&forged), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["details"], "malformed");
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let (app, state) = create_test_app();
    let (user_id, _, _) = register_and_login(&app, "oscar").await;

    let expired = state
        .tokens
        .issue_with_ttl(&user_id, TokenKind::Access, chrono::Duration::seconds(-1))
        .unwrap();

    let (status, body) = send(&app, request("GET", "/api/v1/auth/me", Some(&expired), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
    assert_eq!(body["details"], "expired");
}
