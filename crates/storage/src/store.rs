// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The embedded store: one SQLite connection behind an exclusive latch.
//!
//! The daemon is the sole writer process. A single connection guarded by a
//! mutex is the write latch that linearizes competing read-modify-write
//! transactions; listings go through the same latch without an explicit
//! transaction.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use thiserror::Error;

use crate::schema;

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("schema verification failed: missing index {0}")]
    MissingIndex(String),

    #[error("invalid stored row: {0}")]
    Corrupt(String),
}

impl From<StorageError> for pd_core::ApiError {
    fn from(e: StorageError) -> Self {
        pd_core::ApiError::internal(e.to_string())
    }
}

/// Handle to the open database.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (creating if needed) the database at `path`, enable WAL and
    /// foreign keys, run idempotent schema creation, verify indexes, and
    /// reclaim orphaned rows.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "busy_timeout", 5_000)?;
        // Identity collation is case-sensitive; LIKE must match it.
        conn.pragma_update(None, "case_sensitive_like", "ON")?;
        schema::create(&conn)?;
        schema::verify_indexes(&conn)?;
        schema::reclaim_orphans(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Run a read (or a single-statement write) under the latch.
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StorageError> {
        let conn = self.conn.lock();
        Ok(f(&conn)?)
    }

    /// Run a read-modify-write inside one `BEGIN IMMEDIATE` transaction.
    ///
    /// The closure's error rolls the transaction back and is returned
    /// unchanged, so domain failures (lock held, file conflict) surface
    /// with an untouched database.
    pub fn with_tx<T, E>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StorageError>,
    {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| E::from(StorageError::from(e)))?;
        let out = f(&tx)?;
        tx.commit().map_err(|e| E::from(StorageError::from(e)))?;
        Ok(out)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
