// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Periodic cleanup of expired revocation entries.
//!
//! MongoDB also reaps these through a TTL index; the sweep covers the
//! in-memory store and TTL monitor lag.

use std::time::Duration;

use tokio::task::JoinHandle;

use super::tokens::TokenService;

/// Run `purge_expired` every `period` until the runtime shuts down.
pub fn spawn_revocation_sweeper(tokens: TokenService, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match tokens.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => tracing::info!(purged, "Purged expired revoked tokens"),
                Err(e) => tracing::warn!(error = %e, "Revocation sweep failed"),
            }
        }
    })
}
