// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project records. The daemon only persists what external scanners
//! discovered; nothing in the critical path reads these.

use rusqlite::{params, Connection, OptionalExtension};

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectRow {
    pub id: String,
    pub root: String,
    pub kind: Option<String>,
    pub config: Option<String>,
    pub services: Option<String>,
    pub last_scanned: Option<u64>,
    pub created_at: u64,
    pub metadata: Option<String>,
}

const COLUMNS: &str = "id, root, kind, config, services, last_scanned, created_at, metadata";

fn row_to_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProjectRow> {
    Ok(ProjectRow {
        id: row.get(0)?,
        root: row.get(1)?,
        kind: row.get(2)?,
        config: row.get(3)?,
        services: row.get(4)?,
        last_scanned: row.get::<_, Option<i64>>(5)?.map(|v| v as u64),
        created_at: row.get::<_, i64>(6)? as u64,
        metadata: row.get(7)?,
    })
}

#[allow(clippy::too_many_arguments)]
pub fn upsert(
    conn: &Connection,
    id: &str,
    root: &str,
    kind: Option<&str>,
    config: Option<&str>,
    services: Option<&str>,
    metadata: Option<&str>,
    now: u64,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO projects (id, root, kind, config, services, last_scanned, created_at, \
         metadata) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, ?7) \
         ON CONFLICT(id) DO UPDATE SET \
             root = excluded.root, kind = excluded.kind, config = excluded.config, \
             services = excluded.services, last_scanned = excluded.last_scanned, \
             metadata = excluded.metadata",
        params![id, root, kind, config, services, now as i64, metadata],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: &str) -> rusqlite::Result<Option<ProjectRow>> {
    conn.query_row(&format!("SELECT {COLUMNS} FROM projects WHERE id = ?1"), [id], row_to_project)
        .optional()
}

pub fn list(conn: &Connection) -> rusqlite::Result<Vec<ProjectRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM projects ORDER BY id"))?;
    let rows = stmt.query_map([], row_to_project)?;
    rows.collect()
}

pub fn delete(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    Ok(conn.execute("DELETE FROM projects WHERE id = ?1", [id])? > 0)
}

#[cfg(test)]
#[path = "projects_tests.rs"]
mod tests;
