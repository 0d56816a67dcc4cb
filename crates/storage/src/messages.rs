// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pub/sub message rows. Channels exist implicitly: a channel is the set
//! of messages sharing its name.

use rusqlite::{params, Connection};

/// One persisted message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRow {
    pub id: i64,
    pub channel: String,
    pub payload: String,
    pub sender: Option<String>,
    pub created_at: u64,
    pub expires_at: Option<u64>,
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        channel: row.get(1)?,
        payload: row.get(2)?,
        sender: row.get(3)?,
        created_at: row.get::<_, i64>(4)? as u64,
        expires_at: row.get::<_, Option<i64>>(5)?.map(|v| v as u64),
    })
}

const COLUMNS: &str = "id, channel, payload, sender, created_at, expires_at";

/// Persist a message; returns its channel-unique, strictly increasing id.
pub fn insert(
    conn: &Connection,
    channel: &str,
    payload: &str,
    sender: Option<&str>,
    now: u64,
    expires_at: Option<u64>,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO messages (channel, payload, sender, created_at, expires_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![channel, payload, sender, now as i64, expires_at.map(|v| v as i64)],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Messages with `id > after`, oldest first, capped at `limit`.
pub fn list_after(
    conn: &Connection,
    channel: &str,
    after: i64,
    limit: u32,
) -> rusqlite::Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM messages WHERE channel = ?1 AND id > ?2 \
         ORDER BY id ASC LIMIT ?3"
    ))?;
    let rows = stmt.query_map(params![channel, after, limit], row_to_message)?;
    rows.collect()
}

/// The newest `limit` messages, oldest first.
pub fn list_recent(
    conn: &Connection,
    channel: &str,
    limit: u32,
) -> rusqlite::Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT * FROM (SELECT {COLUMNS} FROM messages WHERE channel = ?1 \
         ORDER BY id DESC LIMIT ?2) ORDER BY id ASC"
    ))?;
    let rows = stmt.query_map(params![channel, limit], row_to_message)?;
    rows.collect()
}

pub fn latest_id(conn: &Connection, channel: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(id), 0) FROM messages WHERE channel = ?1",
        [channel],
        |row| row.get(0),
    )
}

pub fn delete_expired(conn: &Connection, now: u64) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM messages WHERE expires_at IS NOT NULL AND expires_at <= ?1",
        [now as i64],
    )
}

pub fn count(conn: &Connection) -> rusqlite::Result<u64> {
    conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get::<_, i64>(0))
        .map(|n| n as u64)
}

#[cfg(test)]
#[path = "messages_tests.rs"]
mod tests;
