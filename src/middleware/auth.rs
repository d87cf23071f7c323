// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bearer token authentication.

use crate::error::AppError;
use crate::services::TokenKind;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Cookie carrying the access token for browser clients.
pub const ACCESS_COOKIE: &str = "access_token";

/// Authenticated user extracted from an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
}

/// Token from an `Authorization: Bearer` header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Access token from the cookie, falling back to the header.
fn request_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    jar.get(ACCESS_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| bearer_token(headers).map(str::to_string))
}

async fn authenticate(state: &AppState, token: &str) -> Result<AuthUser, AppError> {
    let claims = state.tokens.verify(token, TokenKind::Access).await?;
    Ok(AuthUser {
        user_id: claims.sub,
    })
}

/// Middleware that requires a valid, unrevoked access token.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request_token(&jar, request.headers()).ok_or(AppError::Unauthorized)?;
    let auth_user = authenticate(&state, &token).await?;
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Identity for endpoints where authentication is optional.
///
/// No token at all is anonymous; a token that fails verification is an
/// error, so a client with a stale session finds out instead of silently
/// losing its history.
pub async fn optional_identity(
    state: &AppState,
    jar: &CookieJar,
    headers: &HeaderMap,
) -> Result<Option<AuthUser>, AppError> {
    match request_token(jar, headers) {
        Some(token) => authenticate(state, &token).await.map(Some),
        None => Ok(None),
    }
}

/// Identity for the chat socket: query token first, then header or cookie.
/// Anything that fails verification is treated as anonymous.
pub async fn socket_identity(
    state: &AppState,
    query_token: Option<&str>,
    jar: &CookieJar,
    headers: &HeaderMap,
) -> Option<AuthUser> {
    let token = query_token
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or_else(|| request_token(jar, headers))?;

    match authenticate(state, &token).await {
        Ok(user) => Some(user),
        Err(e) => {
            tracing::debug!(error = %e, "Socket token rejected, continuing anonymously");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_cookie_takes_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer header"));
        headers.insert(header::COOKIE, HeaderValue::from_static("access_token=cookie"));

        let jar = CookieJar::from_headers(&headers);
        assert_eq!(request_token(&jar, &headers).as_deref(), Some("cookie"));
        assert_eq!(
            request_token(&CookieJar::new(), &headers).as_deref(),
            Some("header")
        );
    }
}
