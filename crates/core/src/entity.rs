// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persistable domain record contract.

use crate::job::Tag;
use crate::validate::{InvalidState, ValidationIssue};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

/// A domain record that maps to exactly one row.
///
/// `TYPE_TAG` is the value stored in the row's `dsmall` column, `tags()`
/// feeds the `dmedium` tag list, and the `dlarge` payload is the serde form
/// of the record itself.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Fully qualified logical type name.
    const TYPE_TAG: &'static str;

    fn id(&self) -> Uuid;

    /// Row version; 0 means the record has never been persisted.
    fn ver(&self) -> i64;

    fn set_ver(&mut self, ver: i64);

    /// Canonicalize in place (trimming, casefolding, re-indexing).
    fn normalize(&mut self);

    /// Structured validation; an empty list means valid.
    fn validate(&self) -> Vec<ValidationIssue>;

    /// Labels for the row's tag list.
    fn tags(&self) -> Vec<Tag> {
        Vec::new()
    }

    /// Normalize, then fail with [`InvalidState`] when validation reports issues.
    fn check(&mut self) -> Result<(), InvalidState> {
        self.normalize();
        let issues = self.validate();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(InvalidState::new(issues))
        }
    }
}
