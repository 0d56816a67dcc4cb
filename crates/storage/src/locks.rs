// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advisory lock rows and queries.

use rusqlite::{params, Connection, OptionalExtension};

/// One named lock.
#[derive(Debug, Clone, PartialEq)]
pub struct LockRow {
    pub name: String,
    pub owner: String,
    pub pid: Option<u32>,
    pub acquired_at: u64,
    pub expires_at: u64,
    pub metadata: Option<String>,
}

fn row_to_lock(row: &rusqlite::Row<'_>) -> rusqlite::Result<LockRow> {
    Ok(LockRow {
        name: row.get(0)?,
        owner: row.get(1)?,
        pid: row.get::<_, Option<i64>>(2)?.map(|p| p as u32),
        acquired_at: row.get::<_, i64>(3)? as u64,
        expires_at: row.get::<_, i64>(4)? as u64,
        metadata: row.get(5)?,
    })
}

const COLUMNS: &str = "name, owner, pid, acquired_at, expires_at, metadata";

pub fn get(conn: &Connection, name: &str) -> rusqlite::Result<Option<LockRow>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM locks WHERE name = ?1"),
        [name],
        row_to_lock,
    )
    .optional()
}

/// Insert or overwrite the row for `name`.
pub fn upsert(
    conn: &Connection,
    name: &str,
    owner: &str,
    pid: Option<u32>,
    acquired_at: u64,
    expires_at: u64,
    metadata: Option<&str>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO locks (name, owner, pid, acquired_at, expires_at, metadata) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
         ON CONFLICT(name) DO UPDATE SET \
             owner = excluded.owner, pid = excluded.pid, \
             acquired_at = excluded.acquired_at, expires_at = excluded.expires_at, \
             metadata = excluded.metadata",
        params![
            name,
            owner,
            pid.map(i64::from),
            acquired_at as i64,
            expires_at as i64,
            metadata
        ],
    )?;
    Ok(())
}

/// Refresh `expires_at`, preserving `acquired_at`.
pub fn extend(conn: &Connection, name: &str, expires_at: u64) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE locks SET expires_at = ?2 WHERE name = ?1",
        params![name, expires_at as i64],
    )?;
    Ok(changed > 0)
}

pub fn delete(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    Ok(conn.execute("DELETE FROM locks WHERE name = ?1", [name])? > 0)
}

pub fn delete_expired(conn: &Connection, now: u64) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM locks WHERE expires_at <= ?1", [now as i64])
}

/// Release every lock held by a given owner; used when an agent
/// unregisters or goes stale.
pub fn delete_by_owner(conn: &Connection, owner: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM locks WHERE owner = ?1", [owner])
}

/// Release every lock attributed to a dead pid.
pub fn delete_by_pid(conn: &Connection, pid: u32) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM locks WHERE pid = ?1", [i64::from(pid)])
}

pub fn list(conn: &Connection, owner: Option<&str>) -> rusqlite::Result<Vec<LockRow>> {
    match owner {
        Some(owner) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM locks WHERE owner = ?1 ORDER BY name"
            ))?;
            let rows = stmt.query_map([owner], row_to_lock)?;
            rows.collect()
        }
        None => {
            let mut stmt =
                conn.prepare(&format!("SELECT {COLUMNS} FROM locks ORDER BY name"))?;
            let rows = stmt.query_map([], row_to_lock)?;
            rows.collect()
        }
    }
}

pub fn count_for_owner(conn: &Connection, owner: &str) -> rusqlite::Result<u64> {
    conn.query_row("SELECT COUNT(*) FROM locks WHERE owner = ?1", [owner], |row| {
        row.get::<_, i64>(0)
    })
    .map(|n| n as u64)
}

#[cfg(test)]
#[path = "locks_tests.rs"]
mod tests;
