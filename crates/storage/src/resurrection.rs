// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resurrection-queue rows: recoverable work left by lapsed agents.

use rusqlite::{params, Connection, OptionalExtension};

/// One queue entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ResurrectionRow {
    pub agent_id: String,
    pub project: Option<String>,
    pub stack: Option<String>,
    pub context: Option<String>,
    pub purpose: Option<String>,
    pub session_id: Option<String>,
    pub status: String,
    pub stale_at: u64,
    pub dead_at: Option<u64>,
    pub claimed_by: Option<String>,
}

const COLUMNS: &str =
    "agent_id, project, stack, context, purpose, session_id, status, stale_at, dead_at, claimed_by";

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<ResurrectionRow> {
    Ok(ResurrectionRow {
        agent_id: row.get(0)?,
        project: row.get(1)?,
        stack: row.get(2)?,
        context: row.get(3)?,
        purpose: row.get(4)?,
        session_id: row.get(5)?,
        status: row.get(6)?,
        stale_at: row.get::<_, i64>(7)? as u64,
        dead_at: row.get::<_, Option<i64>>(8)?.map(|v| v as u64),
        claimed_by: row.get(9)?,
    })
}

/// Enqueue a lapsed agent as `stale`. Re-enqueueing an already-queued
/// agent is a no-op so a claim in progress is not clobbered.
#[allow(clippy::too_many_arguments)]
pub fn enqueue_stale(
    conn: &Connection,
    agent_id: &str,
    project: Option<&str>,
    stack: Option<&str>,
    context: Option<&str>,
    purpose: Option<&str>,
    session_id: Option<&str>,
    now: u64,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "INSERT INTO resurrection (agent_id, project, stack, context, purpose, session_id, \
         status, stale_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'stale', ?7) \
         ON CONFLICT(agent_id) DO NOTHING",
        params![agent_id, project, stack, context, purpose, session_id, now as i64],
    )?;
    Ok(changed > 0)
}

/// Promote `stale` entries whose staleness began at least `dead_after_ms`
/// before `now`. Returns the promoted agent ids.
pub fn promote_dead(
    conn: &Connection,
    now: u64,
    dead_after_ms: u64,
) -> rusqlite::Result<Vec<String>> {
    let cutoff = now.saturating_sub(dead_after_ms) as i64;
    let mut stmt = conn.prepare(
        "SELECT agent_id FROM resurrection WHERE status = 'stale' AND stale_at <= ?1",
    )?;
    let ids: Vec<String> =
        stmt.query_map([cutoff], |row| row.get(0))?.collect::<rusqlite::Result<_>>()?;
    for id in &ids {
        conn.execute(
            "UPDATE resurrection SET status = 'dead', dead_at = ?2 WHERE agent_id = ?1",
            params![id, now as i64],
        )?;
    }
    Ok(ids)
}

pub fn get(conn: &Connection, agent_id: &str) -> rusqlite::Result<Option<ResurrectionRow>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM resurrection WHERE agent_id = ?1"),
        [agent_id],
        row_to_entry,
    )
    .optional()
}

/// List entries, optionally filtered by identity prefix and status.
pub fn list(
    conn: &Connection,
    project: Option<&str>,
    stack: Option<&str>,
    status: Option<&str>,
) -> rusqlite::Result<Vec<ResurrectionRow>> {
    let mut sql = format!("SELECT {COLUMNS} FROM resurrection WHERE 1=1");
    let mut params_vec: Vec<rusqlite::types::Value> = Vec::new();
    for (column, value) in [("project", project), ("stack", stack), ("status", status)] {
        if let Some(value) = value {
            sql.push_str(&format!(" AND {column} = ?{}", params_vec.len() + 1));
            params_vec.push(value.to_string().into());
        }
    }
    sql.push_str(" ORDER BY stale_at");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(params_vec), row_to_entry)?;
    rows.collect()
}

/// Atomically transition `stale|dead -> resurrecting`; false when the
/// entry is missing or already claimed.
pub fn claim(conn: &Connection, agent_id: &str, claimed_by: Option<&str>) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE resurrection SET status = 'resurrecting', claimed_by = ?2 \
         WHERE agent_id = ?1 AND status IN ('stale', 'dead')",
        params![agent_id, claimed_by],
    )?;
    Ok(changed > 0)
}

/// Revert a claim: `resurrecting` falls back to `dead` when the entry was
/// ever promoted, else `stale`.
pub fn abandon(conn: &Connection, agent_id: &str) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE resurrection SET \
             status = CASE WHEN dead_at IS NULL THEN 'stale' ELSE 'dead' END, \
             claimed_by = NULL \
         WHERE agent_id = ?1 AND status = 'resurrecting'",
        [agent_id],
    )?;
    Ok(changed > 0)
}

pub fn delete(conn: &Connection, agent_id: &str) -> rusqlite::Result<bool> {
    Ok(conn.execute("DELETE FROM resurrection WHERE agent_id = ?1", [agent_id])? > 0)
}

#[cfg(test)]
#[path = "resurrection_tests.rs"]
mod tests;
