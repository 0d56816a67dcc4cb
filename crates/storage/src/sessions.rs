// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session, file-claim, and note rows.
//!
//! The conflict invariant — at most one unreleased claim per path across
//! active sessions — is enforced by `conflicts_for` inside the same
//! transaction that inserts claims; the table's keys alone cannot express
//! it because a `(session_id, file_path)` pair may recur after release.

use rusqlite::{params, Connection, OptionalExtension};

/// One session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRow {
    pub id: String,
    pub purpose: String,
    pub status: String,
    pub agent_id: Option<String>,
    pub worktree_id: Option<String>,
    pub metadata: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
    pub completed_at: Option<u64>,
}

/// One file claim (historical rows keep a non-null `released_at`).
#[derive(Debug, Clone, PartialEq)]
pub struct FileClaimRow {
    pub id: i64,
    pub session_id: String,
    pub file_path: String,
    pub claimed_at: u64,
    pub released_at: Option<u64>,
}

/// One append-only note.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteRow {
    pub id: i64,
    pub session_id: String,
    pub content: String,
    pub kind: String,
    pub created_at: u64,
}

/// A conflicting unreleased claim held by another active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub path: String,
    pub session_id: String,
}

/// Listing filter.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub status: Option<String>,
    pub agent_id: Option<String>,
    pub worktree_id: Option<String>,
}

const COLUMNS: &str =
    "id, purpose, status, agent_id, worktree_id, metadata, created_at, updated_at, completed_at";

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        id: row.get(0)?,
        purpose: row.get(1)?,
        status: row.get(2)?,
        agent_id: row.get(3)?,
        worktree_id: row.get(4)?,
        metadata: row.get(5)?,
        created_at: row.get::<_, i64>(6)? as u64,
        updated_at: row.get::<_, i64>(7)? as u64,
        completed_at: row.get::<_, Option<i64>>(8)?.map(|v| v as u64),
    })
}

pub fn insert(
    conn: &Connection,
    id: &str,
    purpose: &str,
    agent_id: Option<&str>,
    worktree_id: Option<&str>,
    metadata: Option<&str>,
    now: u64,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO sessions (id, purpose, status, agent_id, worktree_id, metadata, \
         created_at, updated_at) VALUES (?1, ?2, 'active', ?3, ?4, ?5, ?6, ?6)",
        params![id, purpose, agent_id, worktree_id, metadata, now as i64],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: &str) -> rusqlite::Result<Option<SessionRow>> {
    conn.query_row(&format!("SELECT {COLUMNS} FROM sessions WHERE id = ?1"), [id], row_to_session)
        .optional()
}

pub fn list(conn: &Connection, filter: &SessionFilter) -> rusqlite::Result<Vec<SessionRow>> {
    let mut sql = format!("SELECT {COLUMNS} FROM sessions WHERE 1=1");
    let mut params_vec: Vec<rusqlite::types::Value> = Vec::new();
    for (column, value) in [
        ("status", &filter.status),
        ("agent_id", &filter.agent_id),
        ("worktree_id", &filter.worktree_id),
    ] {
        if let Some(value) = value {
            sql.push_str(&format!(" AND {column} = ?{}", params_vec.len() + 1));
            params_vec.push(value.clone().into());
        }
    }
    sql.push_str(" ORDER BY updated_at DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(params_vec), row_to_session)?;
    rows.collect()
}

/// The caller's active session: most recent `updated_at` wins.
pub fn active_for_agent(conn: &Connection, agent_id: &str) -> rusqlite::Result<Option<SessionRow>> {
    conn.query_row(
        &format!(
            "SELECT {COLUMNS} FROM sessions WHERE agent_id = ?1 AND status = 'active' \
             ORDER BY updated_at DESC, id DESC LIMIT 1"
        ),
        [agent_id],
        row_to_session,
    )
    .optional()
}

pub fn touch(conn: &Connection, id: &str, now: u64) -> rusqlite::Result<()> {
    conn.execute("UPDATE sessions SET updated_at = ?2 WHERE id = ?1", params![id, now as i64])?;
    Ok(())
}

/// Transition `active -> completed|abandoned`, stamping `completed_at`.
pub fn finish(conn: &Connection, id: &str, status: &str, now: u64) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE sessions SET status = ?2, completed_at = ?3, updated_at = ?3 \
         WHERE id = ?1 AND status = 'active'",
        params![id, status, now as i64],
    )?;
    Ok(changed > 0)
}

/// Hard delete; CASCADE removes claims and notes.
pub fn delete(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    Ok(conn.execute("DELETE FROM sessions WHERE id = ?1", [id])? > 0)
}

/// Re-parent sessions from a dead agent to its replacement.
pub fn reparent_agent(conn: &Connection, old: &str, new: &str, now: u64) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE sessions SET agent_id = ?2, updated_at = ?3 WHERE agent_id = ?1",
        params![old, new, now as i64],
    )
}

/// Unreleased claims on `paths` held by *other* active sessions.
pub fn conflicts_for(
    conn: &Connection,
    paths: &[String],
    exclude_session: Option<&str>,
) -> rusqlite::Result<Vec<Conflict>> {
    let mut conflicts = Vec::new();
    let mut stmt = conn.prepare(
        "SELECT sf.file_path, sf.session_id FROM session_files sf \
         JOIN sessions s ON s.id = sf.session_id \
         WHERE sf.file_path = ?1 AND sf.released_at IS NULL AND s.status = 'active'",
    )?;
    for path in paths {
        let rows = stmt.query_map([path], |row| {
            Ok(Conflict { path: row.get(0)?, session_id: row.get(1)? })
        })?;
        for conflict in rows {
            let conflict = conflict?;
            if Some(conflict.session_id.as_str()) != exclude_session {
                conflicts.push(conflict);
            }
        }
    }
    Ok(conflicts)
}

/// Insert an unreleased claim row per path.
pub fn claim_files(
    conn: &Connection,
    session_id: &str,
    paths: &[String],
    now: u64,
) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO session_files (session_id, file_path, claimed_at) VALUES (?1, ?2, ?3)",
    )?;
    for path in paths {
        stmt.execute(params![session_id, path, now as i64])?;
    }
    Ok(())
}

/// Release this session's unreleased claims on `paths`; returns the paths
/// actually released.
pub fn release_files(
    conn: &Connection,
    session_id: &str,
    paths: &[String],
    now: u64,
) -> rusqlite::Result<Vec<String>> {
    let mut released = Vec::new();
    let mut stmt = conn.prepare(
        "UPDATE session_files SET released_at = ?3 \
         WHERE session_id = ?1 AND file_path = ?2 AND released_at IS NULL",
    )?;
    for path in paths {
        if stmt.execute(params![session_id, path, now as i64])? > 0 {
            released.push(path.clone());
        }
    }
    Ok(released)
}

/// Release every unreleased claim of the session; returns released paths.
pub fn release_all_files(
    conn: &Connection,
    session_id: &str,
    now: u64,
) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT file_path FROM session_files \
         WHERE session_id = ?1 AND released_at IS NULL ORDER BY file_path",
    )?;
    let paths: Vec<String> =
        stmt.query_map([session_id], |row| row.get(0))?.collect::<rusqlite::Result<_>>()?;
    conn.execute(
        "UPDATE session_files SET released_at = ?2 \
         WHERE session_id = ?1 AND released_at IS NULL",
        params![session_id, now as i64],
    )?;
    Ok(paths)
}

/// Release claims on `paths` held by any other active session (the
/// `force` path of a claim); returns the released conflicts.
pub fn force_release_paths(
    conn: &Connection,
    paths: &[String],
    exclude_session: Option<&str>,
    now: u64,
) -> rusqlite::Result<Vec<Conflict>> {
    let conflicts = conflicts_for(conn, paths, exclude_session)?;
    let mut stmt = conn.prepare(
        "UPDATE session_files SET released_at = ?3 \
         WHERE session_id = ?1 AND file_path = ?2 AND released_at IS NULL",
    )?;
    for conflict in &conflicts {
        stmt.execute(params![conflict.session_id, conflict.path, now as i64])?;
    }
    Ok(conflicts)
}

/// Unreleased paths of one session.
pub fn unreleased_files(conn: &Connection, session_id: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT file_path FROM session_files \
         WHERE session_id = ?1 AND released_at IS NULL ORDER BY file_path",
    )?;
    let rows = stmt.query_map([session_id], |row| row.get(0))?;
    rows.collect()
}

pub fn insert_note(
    conn: &Connection,
    session_id: &str,
    content: &str,
    kind: &str,
    now: u64,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO session_notes (session_id, content, kind, created_at) \
         VALUES (?1, ?2, ?3, ?4)",
        params![session_id, content, kind, now as i64],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Notes for a session, newest first.
pub fn list_notes(
    conn: &Connection,
    session_id: &str,
    limit: u32,
) -> rusqlite::Result<Vec<NoteRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, session_id, content, kind, created_at FROM session_notes \
         WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![session_id, limit], |row| {
        Ok(NoteRow {
            id: row.get(0)?,
            session_id: row.get(1)?,
            content: row.get(2)?,
            kind: row.get(3)?,
            created_at: row.get::<_, i64>(4)? as u64,
        })
    })?;
    rows.collect()
}

pub fn file_claims(conn: &Connection, session_id: &str) -> rusqlite::Result<Vec<FileClaimRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, session_id, file_path, claimed_at, released_at FROM session_files \
         WHERE session_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map([session_id], |row| {
        Ok(FileClaimRow {
            id: row.get(0)?,
            session_id: row.get(1)?,
            file_path: row.get(2)?,
            claimed_at: row.get::<_, i64>(3)? as u64,
            released_at: row.get::<_, Option<i64>>(4)?.map(|v| v as u64),
        })
    })?;
    rows.collect()
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
