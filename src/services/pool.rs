// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bounded pool of generation slots.
//!
//! Each streaming generation holds one slot for as long as it reads from the
//! model runtime. The pool is built once in `main` and handed to every
//! session, so tests can size it however they like.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct GenerationPool {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl GenerationPool {
    /// A pool with `capacity` slots (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot. The slot is released when the permit drops.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AppError> {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Generation pool closed: {}", e)))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently held.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_slots_are_released_on_drop() {
        let pool = GenerationPool::new(1);
        let permit = pool.acquire().await.unwrap();
        assert_eq!(pool.available(), 0);

        // A second generation waits while the slot is held.
        let waiting = tokio::time::timeout(Duration::from_millis(50), pool.acquire()).await;
        assert!(waiting.is_err());

        drop(permit);
        assert_eq!(pool.available(), 1);
        let _permit = pool.acquire().await.unwrap();
    }

    #[test]
    fn test_zero_capacity_clamped() {
        assert_eq!(GenerationPool::new(0).capacity(), 1);
    }
}
