// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Database handle: pool construction and table DDL.

use crate::error::StoreError;
use crate::row::IdKind;
use crate::table::RowTable;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;

/// Shape of one logical table.
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub name: String,
    pub id_kind: IdKind,
    /// Opt-in index on the tag-map column; off by default.
    pub index_dmedium: bool,
    /// Opt-in index on the payload column; off by default.
    pub index_dlarge: bool,
}

impl TableSpec {
    pub fn new(name: impl Into<String>, id_kind: IdKind) -> Self {
        Self { name: name.into(), id_kind, index_dmedium: false, index_dlarge: false }
    }

    /// DDL statements creating the table and its indices.
    ///
    /// `(id)` is the primary key, `(id, ver)` is uniquely indexed, and
    /// `(dsmall)` is indexed; the payload columns are non-null.
    pub fn ddl(&self) -> Vec<String> {
        let id_column = match self.id_kind {
            IdKind::Int => "id INTEGER PRIMARY KEY AUTOINCREMENT",
            IdKind::Uuid => "id TEXT PRIMARY KEY",
        };
        let mut statements = vec![
            format!(
                "CREATE TABLE IF NOT EXISTS {name} (\
                 {id_column}, \
                 ver INTEGER NOT NULL, \
                 dsmall TEXT NOT NULL, \
                 dmedium TEXT NOT NULL, \
                 dlarge TEXT NOT NULL)",
                name = self.name,
                id_column = id_column,
            ),
            format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS uq_{name}_id_ver ON {name} (id, ver)",
                name = self.name
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS ix_{name}_dsmall ON {name} (dsmall)",
                name = self.name
            ),
        ];
        if self.index_dmedium {
            statements.push(format!(
                "CREATE INDEX IF NOT EXISTS ix_{name}_dmedium ON {name} (dmedium)",
                name = self.name
            ));
        }
        if self.index_dlarge {
            statements.push(format!(
                "CREATE INDEX IF NOT EXISTS ix_{name}_dlarge ON {name} (dlarge)",
                name = self.name
            ));
        }
        statements
    }
}

/// Connection pool plus table factory.
///
/// Injected where needed; the process holds exactly one.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    is_memory: bool,
}

impl Database {
    /// Connect using the configured URI.
    ///
    /// sqlite-family URIs naming `:memory:` get a single-connection pool
    /// with reaping disabled, so the sole connection (and with it the whole
    /// database) survives idle periods.
    pub async fn connect(uri: &str) -> Result<Self, StoreError> {
        let is_memory = uri.contains("sqlite") && uri.contains(":memory:");
        let options = SqliteConnectOptions::from_str(uri)?.create_if_missing(true);
        let pool = if is_memory {
            tracing::warn!(%uri, "running in-memory database");
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new().connect_with(options).await?
        };
        tracing::debug!(%uri, "database connected");
        Ok(Self { pool, is_memory })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    /// Create the table and indices described by `spec`, returning a handle.
    pub async fn create_table(&self, spec: TableSpec) -> Result<Arc<RowTable>, StoreError> {
        for statement in spec.ddl() {
            sqlx::query(&statement).execute(&self.pool).await?;
        }
        tracing::debug!(table = %spec.name, "table ready");
        Ok(Arc::new(RowTable::new(self.pool.clone(), spec)))
    }

    /// Drop the table if it exists.
    pub async fn drop_table(&self, name: &str) -> Result<(), StoreError> {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", name)).execute(&self.pool).await?;
        Ok(())
    }

    /// Drop and recreate the table.
    pub async fn recreate_table(&self, spec: TableSpec) -> Result<Arc<RowTable>, StoreError> {
        self.drop_table(&spec.name).await?;
        self.create_table(spec).await
    }
}
