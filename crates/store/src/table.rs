// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The five-column row table: bulk CRUD with optimistic versioning.
//!
//! Every mutating operation runs inside a transaction. The `*_tx` variants
//! run against a supplied transaction and neither begin nor commit it; the
//! plain variants open one on the pool and commit on success.

use crate::db::TableSpec;
use crate::error::StoreError;
use crate::row::{ColumnMask, IdKind, Row, RowId};
use parking_lot::Mutex;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{QueryBuilder, Row as _, Sqlite, SqliteConnection, SqlitePool};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use uuid::Uuid;

const ROW_VERSION_DEFAULT: i64 = 1;
const ROW_VERSION_STEP: i64 = 1;

/// Per-table SQL text cache keyed by operation shape (`insert`, `delete`,
/// and the eight `update` variants keyed by which payload columns are
/// present).
struct StatementCache {
    cache: Mutex<HashMap<String, Arc<str>>>,
}

impl StatementCache {
    fn new() -> Self {
        Self { cache: Mutex::new(HashMap::new()) }
    }

    fn get(&self, key: &str, build: impl FnOnce() -> String) -> Arc<str> {
        let mut cache = self.cache.lock();
        if let Some(sql) = cache.get(key) {
            return Arc::clone(sql);
        }
        let sql: Arc<str> = build().into();
        cache.insert(key.to_string(), Arc::clone(&sql));
        sql
    }
}

fn bind_id<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    id: RowId,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match id {
        RowId::Int(v) => query.bind(v),
        RowId::Uuid(u) => query.bind(u.simple().to_string()),
    }
}

/// One logical table of [`Row`]s.
pub struct RowTable {
    pool: SqlitePool,
    spec: TableSpec,
    statements: StatementCache,
}

impl RowTable {
    pub fn new(pool: SqlitePool, spec: TableSpec) -> Self {
        Self { pool, spec, statements: StatementCache::new() }
    }

    pub fn spec(&self) -> &TableSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    fn select_clause(&self, cols: ColumnMask) -> String {
        fn column(cols: ColumnMask, mask: ColumnMask, name: &'static str) -> &'static str {
            if cols.contains(mask) {
                name
            } else {
                "NULL"
            }
        }
        format!(
            "SELECT {}, {}, {}, {}, {} FROM {}",
            column(cols, ColumnMask::ID, "id"),
            column(cols, ColumnMask::VER, "ver"),
            column(cols, ColumnMask::DSMALL, "dsmall"),
            column(cols, ColumnMask::DMEDIUM, "dmedium"),
            column(cols, ColumnMask::DLARGE, "dlarge"),
            self.spec.name,
        )
    }

    fn decode_row(&self, row: &SqliteRow) -> Result<Row, StoreError> {
        let id = match self.spec.id_kind {
            IdKind::Int => row.try_get::<Option<i64>, _>(0)?.map(RowId::Int),
            IdKind::Uuid => match row.try_get::<Option<String>, _>(0)? {
                Some(s) => Some(RowId::Uuid(Uuid::parse_str(&s).map_err(|e| {
                    StoreError::Unknown(format!(
                        "invalid uuid {:?} in id column of {}: {}",
                        s, self.spec.name, e
                    ))
                })?)),
                None => None,
            },
        };
        Ok(Row {
            id,
            ver: row.try_get(1)?,
            dsmall: row.try_get(2)?,
            dmedium: row.try_get(3)?,
            dlarge: row.try_get(4)?,
        })
    }

    // ── Select ──────────────────────────────────────────────────────────

    /// Filtered select. The predicate appends its own WHERE clause and bind
    /// parameters to the statement; unselected columns come back `None`
    /// without a round trip.
    pub async fn select<F>(&self, cols: ColumnMask, predicate: F) -> Result<Vec<Row>, StoreError>
    where
        F: FnOnce(&mut QueryBuilder<'static, Sqlite>),
    {
        let mut builder: QueryBuilder<'static, Sqlite> =
            QueryBuilder::new(self.select_clause(cols));
        predicate(&mut builder);
        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(|r| self.decode_row(r)).collect()
    }

    pub async fn select_all(&self, cols: ColumnMask) -> Result<Vec<Row>, StoreError> {
        self.select(cols, |_| {}).await
    }

    pub async fn select_one(&self, id: RowId, cols: ColumnMask) -> Result<Option<Row>, StoreError> {
        let mut builder: QueryBuilder<'static, Sqlite> =
            QueryBuilder::new(self.select_clause(cols));
        push_id_predicate(&mut builder, id);
        let row = builder.build().fetch_optional(&self.pool).await?;
        row.map(|r| self.decode_row(&r)).transpose()
    }

    /// Same as [`select_one`](Self::select_one) but on a supplied
    /// transaction, so mutation failures can be discriminated with the
    /// transaction's own view of the data.
    pub async fn select_one_tx(
        &self,
        tx: &mut SqliteConnection,
        id: RowId,
        cols: ColumnMask,
    ) -> Result<Option<Row>, StoreError> {
        let mut builder: QueryBuilder<'static, Sqlite> =
            QueryBuilder::new(self.select_clause(cols));
        push_id_predicate(&mut builder, id);
        let row = builder.build().fetch_optional(&mut *tx).await?;
        row.map(|r| self.decode_row(&r)).transpose()
    }

    pub async fn select_count<F>(&self, predicate: F) -> Result<i64, StoreError>
    where
        F: FnOnce(&mut QueryBuilder<'static, Sqlite>),
    {
        let mut builder: QueryBuilder<'static, Sqlite> =
            QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", self.spec.name));
        predicate(&mut builder);
        let row = builder.build().fetch_one(&self.pool).await?;
        Ok(row.try_get(0)?)
    }

    pub async fn select_count_all(&self) -> Result<i64, StoreError> {
        self.select_count(|_| {}).await
    }

    /// Distinct set of type tags present in the table.
    pub async fn distinct_dsmall(&self) -> Result<BTreeSet<String>, StoreError> {
        let rows = sqlx::query(&format!("SELECT DISTINCT dsmall FROM {}", self.spec.name))
            .fetch_all(&self.pool)
            .await?;
        let mut out = BTreeSet::new();
        for row in rows {
            out.insert(row.try_get::<String, _>(0)?);
        }
        Ok(out)
    }

    pub async fn select_where_dsmall_in(
        &self,
        values: &[&str],
        cols: ColumnMask,
    ) -> Result<Vec<Row>, StoreError> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let owned: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        self.select(cols, move |builder| {
            builder.push(" WHERE dsmall IN (");
            let mut separated = builder.separated(", ");
            for value in owned {
                separated.push_bind(value);
            }
            builder.push(")");
        })
        .await
    }

    // ── Insert ──────────────────────────────────────────────────────────

    /// Insert rows, returning them in order with `id` and `ver` populated.
    ///
    /// Integer-id tables insert row by row so the generated id can be read
    /// back; UUID-id tables insert in one bulk statement, generating
    /// client-side ids where absent. Inserted rows always have `ver = 1`.
    pub async fn insert(&self, rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let out = self.insert_tx(&mut tx, rows).await?;
        tx.commit().await?;
        Ok(out)
    }

    pub async fn insert_tx(
        &self,
        tx: &mut SqliteConnection,
        rows: Vec<Row>,
    ) -> Result<Vec<Row>, StoreError> {
        if rows.is_empty() {
            return Ok(rows);
        }
        match self.spec.id_kind {
            IdKind::Int => {
                let sql = self.statements.get("insert", || {
                    format!(
                        "INSERT INTO {} (ver, dsmall, dmedium, dlarge) VALUES (?, ?, ?, ?)",
                        self.spec.name
                    )
                });
                let mut out = Vec::with_capacity(rows.len());
                for row in rows {
                    let mut row = normalize_payload(row);
                    let result = sqlx::query(&sql)
                        .bind(ROW_VERSION_DEFAULT)
                        .bind(row.dsmall.clone().unwrap_or_default())
                        .bind(row.dmedium.clone().unwrap_or_default())
                        .bind(row.dlarge.clone().unwrap_or_default())
                        .execute(&mut *tx)
                        .await?;
                    row.id = Some(RowId::Int(result.last_insert_rowid()));
                    row.ver = Some(ROW_VERSION_DEFAULT);
                    out.push(row);
                }
                Ok(out)
            }
            IdKind::Uuid => {
                let rows: Vec<Row> = rows
                    .into_iter()
                    .map(|row| {
                        let mut row = normalize_payload(row);
                        let id =
                            row.id.and_then(|i| i.as_uuid()).unwrap_or_else(Uuid::new_v4);
                        row.id = Some(RowId::Uuid(id));
                        row.ver = Some(ROW_VERSION_DEFAULT);
                        row
                    })
                    .collect();
                let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
                    "INSERT INTO {} (id, ver, dsmall, dmedium, dlarge) ",
                    self.spec.name
                ));
                builder.push_values(rows.iter(), |mut b, row| {
                    let id = match row.id {
                        Some(RowId::Uuid(u)) => u.simple().to_string(),
                        _ => String::new(),
                    };
                    b.push_bind(id)
                        .push_bind(ROW_VERSION_DEFAULT)
                        .push_bind(row.dsmall.clone().unwrap_or_default())
                        .push_bind(row.dmedium.clone().unwrap_or_default())
                        .push_bind(row.dlarge.clone().unwrap_or_default());
                });
                builder.build().execute(&mut *tx).await?;
                Ok(rows)
            }
        }
    }

    // ── Update ──────────────────────────────────────────────────────────

    /// Update rows by `(id, ver)`, returning them with `ver` incremented.
    ///
    /// A `None` payload column is left untouched; with `fill_missing` the
    /// omitted columns are re-read so the returned rows are complete.
    pub async fn update(&self, rows: Vec<Row>, fill_missing: bool) -> Result<Vec<Row>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let out = self.update_tx(&mut tx, rows, fill_missing).await?;
        tx.commit().await?;
        Ok(out)
    }

    pub async fn update_tx(
        &self,
        tx: &mut SqliteConnection,
        rows: Vec<Row>,
        fill_missing: bool,
    ) -> Result<Vec<Row>, StoreError> {
        let mut out = Vec::with_capacity(rows.len());
        for mut row in rows {
            let (id, ver) = match (row.id, row.ver) {
                (Some(id), Some(ver)) => (id, ver),
                _ => {
                    return Err(StoreError::Unknown(format!(
                        "update on {} requires id and ver",
                        self.spec.name
                    )))
                }
            };

            let key = format!(
                "update:{}{}{}",
                if row.dsmall.is_some() { 's' } else { '-' },
                if row.dmedium.is_some() { 'm' } else { '-' },
                if row.dlarge.is_some() { 'l' } else { '-' },
            );
            let sql = self.statements.get(&key, || {
                let mut sets = vec!["ver = ?".to_string()];
                if row.dsmall.is_some() {
                    sets.push("dsmall = ?".to_string());
                }
                if row.dmedium.is_some() {
                    sets.push("dmedium = ?".to_string());
                }
                if row.dlarge.is_some() {
                    sets.push("dlarge = ?".to_string());
                }
                format!(
                    "UPDATE {} SET {} WHERE id = ? AND ver = ?",
                    self.spec.name,
                    sets.join(", ")
                )
            });

            let new_ver = ver + ROW_VERSION_STEP;
            let mut query = sqlx::query(&sql).bind(new_ver);
            if let Some(v) = row.dsmall.clone() {
                query = query.bind(v);
            }
            if let Some(v) = row.dmedium.clone() {
                query = query.bind(v);
            }
            if let Some(v) = row.dlarge.clone() {
                query = query.bind(v);
            }
            let query = bind_id(query, id).bind(ver);
            let result = query.execute(&mut *tx).await?;

            if result.rows_affected() == 0 {
                return Err(self.mutation_failure(tx, id, ver, "UPDATE").await?);
            }

            if fill_missing {
                let mut missing = ColumnMask::ID | ColumnMask::VER;
                if row.dsmall.is_none() {
                    missing |= ColumnMask::DSMALL;
                }
                if row.dmedium.is_none() {
                    missing |= ColumnMask::DMEDIUM;
                }
                if row.dlarge.is_none() {
                    missing |= ColumnMask::DLARGE;
                }
                if missing != (ColumnMask::ID | ColumnMask::VER) {
                    if let Some(full) = self.select_one_tx(tx, id, missing).await? {
                        if row.dsmall.is_none() {
                            row.dsmall = full.dsmall;
                        }
                        if row.dmedium.is_none() {
                            row.dmedium = full.dmedium;
                        }
                        if row.dlarge.is_none() {
                            row.dlarge = full.dlarge;
                        }
                    }
                }
            }

            row.ver = Some(new_ver);
            out.push(row);
        }
        Ok(out)
    }

    // ── Delete ──────────────────────────────────────────────────────────

    /// Delete rows by `(id, ver)`. A row that no longer exists is a no-op;
    /// a version mismatch fails with `Concurrency`.
    pub async fn delete(&self, rows: Vec<Row>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        self.delete_tx(&mut tx, rows).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn delete_tx(
        &self,
        tx: &mut SqliteConnection,
        rows: Vec<Row>,
    ) -> Result<(), StoreError> {
        let sql = self.statements.get("delete", || {
            format!("DELETE FROM {} WHERE id = ? AND ver = ?", self.spec.name)
        });
        for row in rows {
            let (id, ver) = match (row.id, row.ver) {
                (Some(id), Some(ver)) => (id, ver),
                _ => {
                    return Err(StoreError::Unknown(format!(
                        "delete on {} requires id and ver",
                        self.spec.name
                    )))
                }
            };
            let result = bind_id(sqlx::query(&sql), id).bind(ver).execute(&mut *tx).await?;
            if result.rows_affected() == 0 {
                match self.mutation_failure(tx, id, ver, "DELETE").await? {
                    StoreError::NotFound { .. } => {} // already deleted
                    err => return Err(err),
                }
            }
        }
        Ok(())
    }

    /// Delete every row whose `dsmall` matches one of `values`; returns the
    /// number deleted.
    pub async fn delete_by_dsmall(&self, values: &[&str]) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let count = self.delete_by_dsmall_tx(&mut tx, values).await?;
        tx.commit().await?;
        Ok(count)
    }

    pub async fn delete_by_dsmall_tx(
        &self,
        tx: &mut SqliteConnection,
        values: &[&str],
    ) -> Result<u64, StoreError> {
        let sql = format!("DELETE FROM {} WHERE dsmall = ?", self.spec.name);
        let mut count = 0u64;
        for value in values {
            let result = sqlx::query(&sql).bind(*value).execute(&mut *tx).await?;
            count += result.rows_affected();
        }
        Ok(count)
    }

    /// Delete every row; returns the number deleted.
    pub async fn delete_all(&self) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let result =
            sqlx::query(&format!("DELETE FROM {}", self.spec.name)).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }

    /// Classify a zero-row mutation: missing id, version mismatch, or
    /// genuinely unknown.
    async fn mutation_failure(
        &self,
        tx: &mut SqliteConnection,
        id: RowId,
        ver: i64,
        op: &str,
    ) -> Result<StoreError, StoreError> {
        let current = self.select_one_tx(tx, id, ColumnMask::ID | ColumnMask::VER).await?;
        Ok(match current {
            None => StoreError::NotFound { table: self.spec.name.clone(), id },
            Some(actual) if actual.ver != Some(ver) => StoreError::Concurrency {
                table: self.spec.name.clone(),
                id,
                expected: ver,
                actual: actual.ver.unwrap_or(-1),
            },
            Some(_) => StoreError::Unknown(format!(
                "{} affected no rows for {}(id={}, ver={})",
                op, self.spec.name, id, ver
            )),
        })
    }
}

fn push_id_predicate(builder: &mut QueryBuilder<'static, Sqlite>, id: RowId) {
    builder.push(" WHERE id = ");
    match id {
        RowId::Int(v) => builder.push_bind(v),
        RowId::Uuid(u) => builder.push_bind(u.simple().to_string()),
    };
}

/// Stored columns are non-null; coerce omitted payload columns to the empty
/// string on insert.
fn normalize_payload(mut row: Row) -> Row {
    row.dsmall.get_or_insert_with(String::new);
    row.dmedium.get_or_insert_with(String::new);
    row.dlarge.get_or_insert_with(String::new);
    row
}

#[cfg(test)]
#[path = "table_tests.rs"]
mod tests;
