// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded in-memory FIFO shared by trigger producers and workers.
//!
//! Push blocks while the queue is full and fails with `Overflow` only when
//! the producer is cancelled; pop blocks up to a timeout so consumers can
//! notice shutdown. Safe for many producers and many consumers.
//!
//! The queue is per-process: after a restart its contents are rebuilt by
//! the recovery scan over unclaimed executions.

use crate::error::EngineError;
use gantry_core::ExecutionId;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Workers poll with this timeout so cancellation is noticed promptly.
pub const POP_TIMEOUT: Duration = Duration::from_secs(1);

pub struct JobQueue {
    items: Mutex<VecDeque<ExecutionId>>,
    ready: Semaphore,
    space: Semaphore,
    capacity: usize,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            ready: Semaphore::new(0),
            space: Semaphore::new(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn contains(&self, id: ExecutionId) -> bool {
        self.items.lock().iter().any(|queued| *queued == id)
    }

    /// FIFO push; waits for space while the queue is full.
    pub async fn push(
        &self,
        id: ExecutionId,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        let permit = tokio::select! {
            permit = self.space.acquire() => permit.map_err(|_| EngineError::QueueClosed)?,
            _ = cancel.cancelled() => return Err(EngineError::Overflow),
        };
        permit.forget();
        self.items.lock().push_back(id);
        self.ready.add_permits(1);
        Ok(())
    }

    /// Non-blocking push; returns false when the queue is full or the id is
    /// already queued. Used by the recovery scan, which re-attempts on its
    /// next pass.
    pub fn try_push(&self, id: ExecutionId) -> bool {
        if self.contains(id) {
            return false;
        }
        match self.space.try_acquire() {
            Ok(permit) => {
                permit.forget();
                self.items.lock().push_back(id);
                self.ready.add_permits(1);
                true
            }
            Err(_) => false,
        }
    }

    /// Pop the oldest id, waiting up to `timeout`; `None` on timeout.
    pub async fn pop(&self, timeout: Duration) -> Option<ExecutionId> {
        let permit = tokio::time::timeout(timeout, self.ready.acquire()).await.ok()?.ok()?;
        permit.forget();
        let id = self.items.lock().pop_front();
        self.space.add_permits(1);
        id
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
