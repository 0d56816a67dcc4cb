// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only activity log with ring-buffer retention.

use rusqlite::{params, params_from_iter, Connection};

/// One audit entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRow {
    pub id: i64,
    pub timestamp: u64,
    pub kind: String,
    pub agent_id: Option<String>,
    pub target: Option<String>,
    pub details: String,
    pub metadata: Option<String>,
}

/// Query filter for `recent`.
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub kind: Option<String>,
    pub agent_id: Option<String>,
    pub since: Option<u64>,
    pub until: Option<u64>,
    pub limit: u32,
}

fn row_to_activity(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActivityRow> {
    Ok(ActivityRow {
        id: row.get(0)?,
        timestamp: row.get::<_, i64>(1)? as u64,
        kind: row.get(2)?,
        agent_id: row.get(3)?,
        target: row.get(4)?,
        details: row.get(5)?,
        metadata: row.get(6)?,
    })
}

pub fn append(
    conn: &Connection,
    now: u64,
    kind: &str,
    agent_id: Option<&str>,
    target: Option<&str>,
    details: &str,
    metadata: Option<&str>,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO activity (timestamp, kind, agent_id, target, details, metadata) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![now as i64, kind, agent_id, target, details, metadata],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Entries matching the filter, newest first.
pub fn recent(conn: &Connection, filter: &ActivityFilter) -> rusqlite::Result<Vec<ActivityRow>> {
    let mut sql =
        "SELECT id, timestamp, kind, agent_id, target, details, metadata FROM activity WHERE 1=1"
            .to_string();
    let mut params_vec: Vec<rusqlite::types::Value> = Vec::new();
    if let Some(kind) = &filter.kind {
        sql.push_str(&format!(" AND kind = ?{}", params_vec.len() + 1));
        params_vec.push(kind.clone().into());
    }
    if let Some(agent_id) = &filter.agent_id {
        sql.push_str(&format!(" AND agent_id = ?{}", params_vec.len() + 1));
        params_vec.push(agent_id.clone().into());
    }
    if let Some(since) = filter.since {
        sql.push_str(&format!(" AND timestamp >= ?{}", params_vec.len() + 1));
        params_vec.push((since as i64).into());
    }
    if let Some(until) = filter.until {
        sql.push_str(&format!(" AND timestamp <= ?{}", params_vec.len() + 1));
        params_vec.push((until as i64).into());
    }
    sql.push_str(&format!(" ORDER BY id DESC LIMIT ?{}", params_vec.len() + 1));
    params_vec.push(i64::from(filter.limit.max(1)).into());

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params_vec), row_to_activity)?;
    rows.collect()
}

/// Counts grouped by kind since a timestamp.
pub fn summary(conn: &Connection, since: u64) -> rusqlite::Result<Vec<(String, u64)>> {
    let mut stmt = conn.prepare(
        "SELECT kind, COUNT(*) FROM activity WHERE timestamp >= ?1 \
         GROUP BY kind ORDER BY COUNT(*) DESC",
    )?;
    let rows =
        stmt.query_map([since as i64], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as u64)))?;
    rows.collect()
}

pub fn count(conn: &Connection) -> rusqlite::Result<u64> {
    conn.query_row("SELECT COUNT(*) FROM activity", [], |row| row.get::<_, i64>(0))
        .map(|n| n as u64)
}

/// Enforce both retention bounds: drop rows older than `cutoff`, then keep
/// only the newest `max_entries`. Returns the number dropped.
pub fn trim(conn: &Connection, cutoff: u64, max_entries: u64) -> rusqlite::Result<usize> {
    let by_age = conn.execute("DELETE FROM activity WHERE timestamp < ?1", [cutoff as i64])?;
    let by_count = conn.execute(
        "DELETE FROM activity WHERE id NOT IN \
         (SELECT id FROM activity ORDER BY id DESC LIMIT ?1)",
        [max_entries as i64],
    )?;
    Ok(by_age + by_count)
}

#[cfg(test)]
#[path = "activity_tests.rs"]
mod tests;
