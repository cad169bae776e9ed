// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-type store over the shared row table.

use crate::codec;
use crate::error::StoreError;
use crate::row::{ColumnMask, Row, RowId};
use crate::table::RowTable;
use gantry_core::{Entity, Tag};
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

/// Typed view of one record family within the shared table.
///
/// Save is insert when the record has never been persisted (`ver == 0`) and
/// an optimistic `(id, ver)` update otherwise; the record's `ver` is
/// refreshed in place on success.
pub struct TypedStore<T: Entity> {
    table: Arc<RowTable>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> Clone for TypedStore<T> {
    fn clone(&self) -> Self {
        Self { table: Arc::clone(&self.table), _marker: PhantomData }
    }
}

impl<T: Entity> TypedStore<T> {
    pub fn new(table: Arc<RowTable>) -> Self {
        Self { table, _marker: PhantomData }
    }

    pub fn table(&self) -> &RowTable {
        &self.table
    }

    pub async fn save(&self, obj: &mut T) -> Result<(), StoreError> {
        let tags = obj.tags();
        self.save_with_tags(obj, tags).await
    }

    /// Save with an explicit tag list (used where the tags come from an
    /// aggregate rather than the record itself).
    pub async fn save_with_tags(&self, obj: &mut T, tags: Vec<Tag>) -> Result<(), StoreError> {
        obj.check()?;
        let mut row = codec::encode_with_tags(obj, &tags)?;
        row.id = Some(RowId::Uuid(obj.id()));
        if obj.ver() == 0 {
            let inserted = self.table.insert(vec![row]).await?;
            let ver = inserted
                .into_iter()
                .next()
                .and_then(|r| r.ver)
                .ok_or_else(|| StoreError::Unknown("insert returned no rows".to_string()))?;
            obj.set_ver(ver);
        } else {
            row.ver = Some(obj.ver());
            let updated = self.table.update(vec![row], false).await?;
            let ver = updated
                .into_iter()
                .next()
                .and_then(|r| r.ver)
                .ok_or_else(|| StoreError::Unknown("update returned no rows".to_string()))?;
            obj.set_ver(ver);
        }
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<T>, StoreError> {
        Ok(self.get_with_tags(id).await?.map(|(obj, _)| obj))
    }

    /// Fetch a record together with its row tags.
    pub async fn get_with_tags(&self, id: Uuid) -> Result<Option<(T, Vec<Tag>)>, StoreError> {
        let Some(row) = self.table.select_one(RowId::Uuid(id), ColumnMask::ALL).await? else {
            return Ok(None);
        };
        // A row of a different family under this id is not "ours".
        let tag = row.dsmall.as_deref().unwrap_or_default();
        if codec::registry().resolve(tag)?.type_tag() != T::TYPE_TAG {
            return Ok(None);
        }
        let obj = codec::decode::<T>(&row)?;
        let tags = codec::decode_tags(&row)?;
        Ok(Some((obj, tags)))
    }

    pub async fn get_all(&self) -> Result<Vec<T>, StoreError> {
        let rows = self.table.select_where_dsmall_in(&[T::TYPE_TAG], ColumnMask::ALL).await?;
        rows.iter().map(codec::decode::<T>).collect()
    }

    pub async fn get_all_with_tags(&self) -> Result<Vec<(T, Vec<Tag>)>, StoreError> {
        let rows = self.table.select_where_dsmall_in(&[T::TYPE_TAG], ColumnMask::ALL).await?;
        rows.iter()
            .map(|row| Ok((codec::decode::<T>(row)?, codec::decode_tags(row)?)))
            .collect()
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let tag = T::TYPE_TAG.to_string();
        self.table
            .select_count(move |builder| {
                builder.push(" WHERE dsmall = ");
                builder.push_bind(tag);
            })
            .await
    }

    /// Delete by the record's `(id, ver)`; missing rows are a no-op.
    pub async fn delete(&self, obj: &T) -> Result<(), StoreError> {
        let row = Row {
            id: Some(RowId::Uuid(obj.id())),
            ver: Some(obj.ver()),
            ..Row::default()
        };
        self.table.delete(vec![row]).await
    }
}

#[cfg(test)]
#[path = "typed_tests.rs"]
mod tests;
