// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Credential record stored in the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier (also used as document ID)
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    /// bcrypt hash; never leaves the server
    pub password_hash: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Last successful login (RFC3339)
    #[serde(default)]
    pub last_login: Option<String>,
    /// When the account was created (RFC3339)
    pub created_at: String,
}

fn default_active() -> bool {
    true
}

/// Public view of a user, as returned by `/api/v1/auth/me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub last_login: Option<String>,
    pub created_at: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_active: user.is_active,
            last_login: user.last_login,
            created_at: user.created_at,
        }
    }
}
