// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (authentication, security, request logging).

pub mod auth;
pub mod request_log;
pub mod security;

pub use auth::{require_auth, AuthUser};
