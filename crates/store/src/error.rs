// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error kinds exposed by the store.

use crate::row::RowId;
use gantry_core::InvalidState;
use thiserror::Error;

/// Errors raised by the row store, codec, and data service.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An update or delete referenced an id that does not exist.
    #[error("not found: {table}(id={id})")]
    NotFound { table: String, id: RowId },

    /// The `(id, ver)` predicate matched nothing: someone else won the race.
    /// Callers should re-read the row and re-attempt; the store never
    /// retries on their behalf.
    #[error("concurrency conflict: {table}(id={id}) expected ver {expected}, found {actual}")]
    Concurrency { table: String, id: RowId, expected: i64, actual: i64 },

    #[error(transparent)]
    InvalidState(#[from] InvalidState),

    /// The codec registry could not resolve a type tag.
    #[error("unknown type tag: {0:?}")]
    UnknownType(String),

    /// A mutation affected zero rows for no reason the store can name.
    #[error("store operation failed: {0}")]
    Unknown(String),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
