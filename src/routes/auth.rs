// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account and session token routes.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::UserProfile;
use crate::AppState;

const TOKEN_TYPE: &str = "bearer";

/// Routes that need no token.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/auth/refresh", post(refresh))
}

/// Routes behind `require_auth`.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/v1/auth/me", get(me))
}

fn validated<T: Validate>(body: T) -> Result<T> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    Ok(body)
}

// ─── Register ────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct RegistrationRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RegistrationResponse {
    pub message: String,
    pub user_id: String,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegistrationRequest>,
) -> Result<(StatusCode, Json<RegistrationResponse>)> {
    let body = validated(body)?;
    let user_id = state
        .accounts
        .register(body.username.trim(), body.email.trim(), &body.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegistrationResponse {
            message: "User registered successfully".to_string(),
            user_id,
        }),
    ))
}

// ─── Login ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>> {
    let body = validated(body)?;
    let (_, tokens) = state
        .accounts
        .login(body.username.trim(), &body.password)
        .await?;

    Ok(Json(TokenResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: TOKEN_TYPE.to_string(),
    }))
}

// ─── Logout / Refresh ────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct LogoutRequest {
    #[validate(length(min = 1, message = "Access token is required"))]
    pub access_token: String,
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

async fn logout(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LogoutRequest>,
) -> Result<Json<MessageResponse>> {
    let body = validated(body)?;
    state
        .accounts
        .logout(&body.access_token, &body.refresh_token)
        .await?;

    Ok(Json(MessageResponse {
        message: "Successfully logged out".to_string(),
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub token_type: String,
}

async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<AccessTokenResponse>> {
    let body = validated(body)?;
    let access_token = state.accounts.refresh(&body.refresh_token).await?;

    Ok(Json(AccessTokenResponse {
        access_token,
        token_type: TOKEN_TYPE.to_string(),
    }))
}

// ─── Profile ─────────────────────────────────────────────────

async fn me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserProfile>> {
    Ok(Json(state.accounts.profile(&user.user_id).await?))
}
