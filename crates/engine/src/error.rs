// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-side error kinds.

use gantry_core::InvalidState;
use gantry_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    InvalidState(#[from] InvalidState),

    /// The queue was full and the producer was cancelled while waiting for
    /// space. Overflow is never a silent drop.
    #[error("queue overflow: producer cancelled while waiting for space")]
    Overflow,

    #[error("queue closed")]
    QueueClosed,

    #[error("invalid cron expression {expr:?}: {message}")]
    Cron { expr: String, message: String },
}
