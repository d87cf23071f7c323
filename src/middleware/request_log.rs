// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-request access log.

use std::time::Instant;

use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

/// Authorization header as it may appear in logs.
fn masked_authorization(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let scheme = value.split_whitespace().next().unwrap_or_default();
    if scheme.is_empty() {
        Some("***".to_string())
    } else {
        Some(format!("{} ***", scheme))
    }
}

/// Log method, path, status and latency of every request.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let authorization = masked_authorization(request.headers());
    let started = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        authorization = authorization.as_deref().unwrap_or("-"),
        "Request handled"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_authorization_is_masked() {
        let mut headers = HeaderMap::new();
        assert_eq!(masked_authorization(&headers), None);

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer eyJhbGciOiJIUzI1NiJ9.secret"),
        );
        assert_eq!(masked_authorization(&headers).as_deref(), Some("Bearer ***"));
    }
}
