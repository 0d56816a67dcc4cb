// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service lease rows and queries.

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use pd_core::Pattern;

/// One service lease.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRow {
    pub identity: String,
    pub project: String,
    pub stack: Option<String>,
    pub context: Option<String>,
    pub port: u16,
    pub pid: Option<u32>,
    pub cmd: Option<String>,
    pub cwd: Option<String>,
    pub status: String,
    pub pair: Option<String>,
    pub metadata: Option<String>,
    pub created_at: u64,
    pub last_seen: u64,
    pub expires_at: Option<u64>,
    pub agent_id: Option<String>,
}

/// Insert arguments for a fresh lease.
#[derive(Debug, Clone)]
pub struct NewService<'a> {
    pub identity: &'a pd_core::Identity,
    pub port: u16,
    pub pid: Option<u32>,
    pub cmd: Option<&'a str>,
    pub cwd: Option<&'a str>,
    pub pair: Option<&'a str>,
    pub metadata: Option<&'a str>,
    pub agent_id: Option<&'a str>,
    pub now: u64,
    pub expires_at: Option<u64>,
}

/// Identity/port pair of a removed lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasedLease {
    pub identity: String,
    pub port: u16,
}

/// Listing filter; all conditions are ANDed.
#[derive(Debug, Clone, Default)]
pub struct ServiceFilter {
    pub pattern: Option<Pattern>,
    pub status: Option<String>,
    pub port: Option<u16>,
    /// Only leases with `expires_at <= value`.
    pub expired_before: Option<u64>,
}

const COLUMNS: &str = "identity, project, stack, context, port, pid, cmd, cwd, \
                       status, pair, metadata, created_at, last_seen, expires_at, agent_id";

fn row_to_service(row: &rusqlite::Row<'_>) -> rusqlite::Result<ServiceRow> {
    Ok(ServiceRow {
        identity: row.get(0)?,
        project: row.get(1)?,
        stack: row.get(2)?,
        context: row.get(3)?,
        port: row.get::<_, i64>(4)? as u16,
        pid: row.get::<_, Option<i64>>(5)?.map(|p| p as u32),
        cmd: row.get(6)?,
        cwd: row.get(7)?,
        status: row.get(8)?,
        pair: row.get(9)?,
        metadata: row.get(10)?,
        created_at: row.get::<_, i64>(11)? as u64,
        last_seen: row.get::<_, i64>(12)? as u64,
        expires_at: row.get::<_, Option<i64>>(13)?.map(|v| v as u64),
        agent_id: row.get(14)?,
    })
}

pub fn insert(conn: &Connection, new: &NewService<'_>) -> rusqlite::Result<()> {
    let (project, stack, context) = new.identity.as_tuple();
    conn.execute(
        "INSERT INTO services (identity, project, stack, context, port, pid, cmd, cwd, \
         status, pair, metadata, created_at, last_seen, expires_at, agent_id) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'assigned', ?9, ?10, ?11, ?11, ?12, ?13)",
        params![
            new.identity.to_string(),
            project,
            stack,
            context,
            i64::from(new.port),
            new.pid.map(i64::from),
            new.cmd,
            new.cwd,
            new.pair,
            new.metadata,
            new.now as i64,
            new.expires_at.map(|v| v as i64),
            new.agent_id,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: &str) -> rusqlite::Result<Option<ServiceRow>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM services WHERE identity = ?1"),
        [id],
        row_to_service,
    )
    .optional()
}

/// Refresh `last_seen` (and `expires_at` when provided) on a re-claim.
pub fn touch(
    conn: &Connection,
    id: &str,
    now: u64,
    expires_at: Option<u64>,
) -> rusqlite::Result<bool> {
    let changed = match expires_at {
        Some(expires) => conn.execute(
            "UPDATE services SET last_seen = ?2, expires_at = ?3 WHERE identity = ?1",
            params![id, now as i64, expires as i64],
        )?,
        None => conn.execute(
            "UPDATE services SET last_seen = ?2 WHERE identity = ?1",
            params![id, now as i64],
        )?,
    };
    Ok(changed > 0)
}

pub fn find(conn: &Connection, filter: &ServiceFilter) -> rusqlite::Result<Vec<ServiceRow>> {
    let mut sql = format!("SELECT {COLUMNS} FROM services WHERE 1=1");
    let mut params_vec: Vec<rusqlite::types::Value> = Vec::new();

    if let Some(pattern) = &filter.pattern {
        append_pattern_conditions(&mut sql, &mut params_vec, pattern);
    }
    if let Some(status) = &filter.status {
        sql.push_str(&format!(" AND status = ?{}", params_vec.len() + 1));
        params_vec.push(status.clone().into());
    }
    if let Some(port) = filter.port {
        sql.push_str(&format!(" AND port = ?{}", params_vec.len() + 1));
        params_vec.push(i64::from(port).into());
    }
    if let Some(now) = filter.expired_before {
        sql.push_str(&format!(
            " AND expires_at IS NOT NULL AND expires_at <= ?{}",
            params_vec.len() + 1
        ));
        params_vec.push((now as i64).into());
    }
    sql.push_str(" ORDER BY identity");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params_vec), row_to_service)?;
    rows.collect()
}

fn append_pattern_conditions(
    sql: &mut String,
    params_vec: &mut Vec<rusqlite::types::Value>,
    pattern: &Pattern,
) {
    let [project, stack, context] = pattern.segment_likes();
    for (column, like) in [("project", project), ("stack", stack), ("context", context)] {
        if let Some(like) = like {
            sql.push_str(&format!(
                " AND {column} LIKE ?{} ESCAPE '\\'",
                params_vec.len() + 1
            ));
            params_vec.push(like.into());
        }
    }
}

/// Delete every lease matching the pattern; returns the removed rows.
pub fn delete_by_pattern(
    conn: &Connection,
    pattern: &Pattern,
) -> rusqlite::Result<Vec<ReleasedLease>> {
    let mut sql = "SELECT identity, port FROM services WHERE 1=1".to_string();
    let mut params_vec: Vec<rusqlite::types::Value> = Vec::new();
    append_pattern_conditions(&mut sql, &mut params_vec, pattern);

    let mut stmt = conn.prepare(&sql)?;
    let released: Vec<ReleasedLease> = stmt
        .query_map(params_from_iter(params_vec), |row| {
            Ok(ReleasedLease {
                identity: row.get(0)?,
                port: row.get::<_, i64>(1)? as u16,
            })
        })?
        .collect::<rusqlite::Result<_>>()?;

    for lease in &released {
        conn.execute("DELETE FROM services WHERE identity = ?1", [&lease.identity])?;
    }
    Ok(released)
}

/// Delete every lease with `expires_at <= now`.
pub fn delete_expired(conn: &Connection, now: u64) -> rusqlite::Result<Vec<ReleasedLease>> {
    let mut stmt = conn.prepare(
        "SELECT identity, port FROM services WHERE expires_at IS NOT NULL AND expires_at <= ?1",
    )?;
    let released: Vec<ReleasedLease> = stmt
        .query_map([now as i64], |row| {
            Ok(ReleasedLease {
                identity: row.get(0)?,
                port: row.get::<_, i64>(1)? as u16,
            })
        })?
        .collect::<rusqlite::Result<_>>()?;
    conn.execute(
        "DELETE FROM services WHERE expires_at IS NOT NULL AND expires_at <= ?1",
        [now as i64],
    )?;
    Ok(released)
}

pub fn delete_exact(conn: &Connection, id: &str) -> rusqlite::Result<Option<ReleasedLease>> {
    let existing = conn
        .query_row(
            "SELECT identity, port FROM services WHERE identity = ?1",
            [id],
            |row| {
                Ok(ReleasedLease {
                    identity: row.get(0)?,
                    port: row.get::<_, i64>(1)? as u16,
                })
            },
        )
        .optional()?;
    if existing.is_some() {
        conn.execute("DELETE FROM services WHERE identity = ?1", [id])?;
    }
    Ok(existing)
}

/// Every currently leased port.
pub fn leased_ports(conn: &Connection) -> rusqlite::Result<Vec<u16>> {
    let mut stmt = conn.prepare("SELECT port FROM services")?;
    let rows = stmt.query_map([], |row| Ok(row.get::<_, i64>(0)? as u16))?;
    rows.collect()
}

pub fn count(conn: &Connection) -> rusqlite::Result<u64> {
    conn.query_row("SELECT COUNT(*) FROM services", [], |row| row.get::<_, i64>(0))
        .map(|n| n as u64)
}

pub fn count_for_agent(conn: &Connection, agent_id: &str) -> rusqlite::Result<u64> {
    conn.query_row(
        "SELECT COUNT(*) FROM services WHERE agent_id = ?1",
        [agent_id],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n as u64)
}

/// Leases carrying a pid, for the sweeper's liveness probe.
pub fn with_pids(conn: &Connection) -> rusqlite::Result<Vec<(String, u16, u32)>> {
    let mut stmt =
        conn.prepare("SELECT identity, port, pid FROM services WHERE pid IS NOT NULL")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get(0)?,
            row.get::<_, i64>(1)? as u16,
            row.get::<_, i64>(2)? as u32,
        ))
    })?;
    rows.collect()
}

pub fn set_endpoint(conn: &Connection, id: &str, env: &str, url: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO service_endpoints (identity, env, url) VALUES (?1, ?2, ?3) \
         ON CONFLICT(identity, env) DO UPDATE SET url = excluded.url",
        params![id, env, url],
    )?;
    Ok(())
}

pub fn endpoints(conn: &Connection, id: &str) -> rusqlite::Result<Vec<(String, String)>> {
    let mut stmt =
        conn.prepare("SELECT env, url FROM service_endpoints WHERE identity = ?1 ORDER BY env")?;
    let rows = stmt.query_map([id], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

#[cfg(test)]
#[path = "services_tests.rs"]
mod tests;
