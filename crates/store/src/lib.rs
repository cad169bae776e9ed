// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gantry-store: the typed object store.
//!
//! Layers, bottom up: a five-column row table with optimistic versioning
//! ([`table::RowTable`]), a JSON codec with a closed type registry
//! ([`codec`]), per-type stores ([`typed::TypedStore`]), and the
//! cross-entity [`service::DataService`].

pub mod codec;
pub mod db;
pub mod error;
pub mod row;
pub mod service;
pub mod table;
pub mod typed;

pub use codec::{decode, decode_any, decode_tags, encode, encode_with_tags, Record, RecordKind};
pub use db::{Database, TableSpec};
pub use error::StoreError;
pub use row::{ColumnMask, IdKind, Row, RowId};
pub use service::{password_hash, password_verify, DataService};
pub use table::RowTable;
pub use typed::TypedStore;
