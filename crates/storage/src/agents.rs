// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent rows and queries.

use rusqlite::{params, Connection, OptionalExtension};

/// One registered agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRow {
    pub id: String,
    pub name: Option<String>,
    pub kind: String,
    pub pid: Option<u32>,
    pub project: Option<String>,
    pub stack: Option<String>,
    pub context: Option<String>,
    pub registered_at: u64,
    pub last_heartbeat: u64,
    pub max_services: u32,
    pub max_locks: u32,
    pub metadata: Option<String>,
}

impl AgentRow {
    /// Active iff the last heartbeat is within `live_ms`.
    pub fn is_active(&self, now: u64, live_ms: u64) -> bool {
        now.saturating_sub(self.last_heartbeat) <= live_ms
    }

    /// The composite identity string, when a prefix tuple was registered.
    pub fn identity(&self) -> Option<String> {
        let project = self.project.as_ref()?;
        let mut s = project.clone();
        if let Some(stack) = &self.stack {
            s.push(':');
            s.push_str(stack);
            if let Some(context) = &self.context {
                s.push(':');
                s.push_str(context);
            }
        }
        Some(s)
    }
}

/// Upsert arguments for registration.
#[derive(Debug, Clone)]
pub struct NewAgent<'a> {
    pub id: &'a str,
    pub name: Option<&'a str>,
    pub kind: &'a str,
    pub pid: Option<u32>,
    pub identity: Option<&'a pd_core::Identity>,
    pub max_services: u32,
    pub max_locks: u32,
    pub metadata: Option<&'a str>,
    pub now: u64,
}

const COLUMNS: &str = "id, name, kind, pid, project, stack, context, \
                       registered_at, last_heartbeat, max_services, max_locks, metadata";

fn row_to_agent(row: &rusqlite::Row<'_>) -> rusqlite::Result<AgentRow> {
    Ok(AgentRow {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: row.get(2)?,
        pid: row.get::<_, Option<i64>>(3)?.map(|p| p as u32),
        project: row.get(4)?,
        stack: row.get(5)?,
        context: row.get(6)?,
        registered_at: row.get::<_, i64>(7)? as u64,
        last_heartbeat: row.get::<_, i64>(8)? as u64,
        max_services: row.get::<_, i64>(9)? as u32,
        max_locks: row.get::<_, i64>(10)? as u32,
        metadata: row.get(11)?,
    })
}

/// Register or refresh; returns true when the row was newly inserted.
pub fn register(conn: &Connection, new: &NewAgent<'_>) -> rusqlite::Result<bool> {
    let existed: bool =
        conn.query_row("SELECT EXISTS(SELECT 1 FROM agents WHERE id = ?1)", [new.id], |row| {
            row.get(0)
        })?;
    let (project, stack, context) = match new.identity {
        Some(identity) => {
            let (p, s, c) = identity.as_tuple();
            (Some(p), s, c)
        }
        None => (None, None, None),
    };
    conn.execute(
        "INSERT INTO agents (id, name, kind, pid, project, stack, context, \
         registered_at, last_heartbeat, max_services, max_locks, metadata) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, ?9, ?10, ?11) \
         ON CONFLICT(id) DO UPDATE SET \
             name = excluded.name, kind = excluded.kind, pid = excluded.pid, \
             project = excluded.project, stack = excluded.stack, context = excluded.context, \
             last_heartbeat = excluded.last_heartbeat, \
             max_services = excluded.max_services, max_locks = excluded.max_locks, \
             metadata = excluded.metadata",
        params![
            new.id,
            new.name,
            new.kind,
            new.pid.map(i64::from),
            project,
            stack,
            context,
            new.now as i64,
            i64::from(new.max_services),
            i64::from(new.max_locks),
            new.metadata,
        ],
    )?;
    Ok(!existed)
}

/// Update the heartbeat; returns false when the agent does not exist.
pub fn heartbeat(conn: &Connection, id: &str, now: u64) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE agents SET last_heartbeat = ?2 WHERE id = ?1",
        params![id, now as i64],
    )?;
    Ok(changed > 0)
}

pub fn get(conn: &Connection, id: &str) -> rusqlite::Result<Option<AgentRow>> {
    conn.query_row(&format!("SELECT {COLUMNS} FROM agents WHERE id = ?1"), [id], row_to_agent)
        .optional()
}

pub fn delete(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    Ok(conn.execute("DELETE FROM agents WHERE id = ?1", [id])? > 0)
}

pub fn list(conn: &Connection) -> rusqlite::Result<Vec<AgentRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM agents ORDER BY id"))?;
    let rows = stmt.query_map([], row_to_agent)?;
    rows.collect()
}

/// Agents whose heartbeat lapsed at least `stale_ms` ago.
pub fn stale(conn: &Connection, now: u64, stale_ms: u64) -> rusqlite::Result<Vec<AgentRow>> {
    let cutoff = now.saturating_sub(stale_ms) as i64;
    let mut stmt = conn
        .prepare(&format!("SELECT {COLUMNS} FROM agents WHERE last_heartbeat <= ?1 ORDER BY id"))?;
    let rows = stmt.query_map([cutoff], row_to_agent)?;
    rows.collect()
}

#[cfg(test)]
#[path = "agents_tests.rs"]
mod tests;
