// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sessions, file claims, and notes.
//!
//! The conflict engine guards one invariant: for any path, at most one
//! unreleased claim across active sessions. All claim mutations run the
//! conflict check and the insert in one transaction.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use pd_core::{ids, validate, ApiError, Clock, ErrorKind};
use pd_storage::sessions::{self, Conflict, SessionFilter, SessionRow};
use pd_storage::{StorageError, Store};
use pd_wire::{SessionInfo, SessionNoteInfo};

/// Arguments to `start`.
#[derive(Debug, Clone, Default)]
pub struct StartArgs {
    pub purpose: String,
    pub agent_id: Option<String>,
    pub files: Vec<String>,
    pub force: bool,
    pub cwd: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// A started session.
#[derive(Debug, Clone)]
pub struct StartOutcome {
    pub id: String,
    pub claimed: Vec<String>,
    /// Claims of other sessions released by `force`.
    pub displaced: Vec<Conflict>,
}

/// Result of ending a session.
#[derive(Debug, Clone)]
pub struct EndOutcome {
    pub status: String,
    pub released_files: Vec<String>,
}

/// Result of a quick note.
#[derive(Debug, Clone)]
pub struct QuickNoteOutcome {
    pub note_id: i64,
    pub session_id: String,
    pub session_created: bool,
}

pub struct SessionRegistry<C: Clock> {
    store: Arc<Store>,
    clock: C,
}

impl<C: Clock> SessionRegistry<C> {
    pub fn new(store: Arc<Store>, clock: C) -> Self {
        Self { store, clock }
    }

    /// Start a session, claiming `files` atomically with the insert.
    pub fn start(&self, args: &StartArgs) -> Result<StartOutcome, ApiError> {
        validate::purpose(&args.purpose)?;
        check_paths(&args.files)?;
        let metadata = validate::metadata_json(args.metadata.as_ref())?;
        let now = self.clock.epoch_ms();
        let id = ids::session_id();
        let worktree = args.cwd.as_deref().map(worktree_id);

        self.store.with_tx(|tx| {
            let displaced = if args.files.is_empty() {
                Vec::new()
            } else if args.force {
                sessions::force_release_paths(tx, &args.files, None, now)
                    .map_err(StorageError::from)?
            } else {
                let conflicts = sessions::conflicts_for(tx, &args.files, None)
                    .map_err(StorageError::from)?;
                if !conflicts.is_empty() {
                    return Err(conflict_error(&conflicts));
                }
                Vec::new()
            };
            sessions::insert(
                tx,
                &id,
                &args.purpose,
                args.agent_id.as_deref(),
                worktree.as_deref(),
                metadata.as_deref(),
                now,
            )
            .map_err(StorageError::from)?;
            sessions::claim_files(tx, &id, &args.files, now).map_err(StorageError::from)?;
            Ok(StartOutcome { id: id.clone(), claimed: args.files.clone(), displaced })
        })
    }

    /// Transition `active -> completed|abandoned`, releasing all files.
    pub fn end(
        &self,
        id: &str,
        status: Option<&str>,
        note: Option<&str>,
    ) -> Result<EndOutcome, ApiError> {
        let status = match status.unwrap_or("completed") {
            s @ ("completed" | "abandoned") => s.to_string(),
            other => {
                return Err(ApiError::validation(format!(
                    "invalid session status: {:?}",
                    other
                )))
            }
        };
        if let Some(note) = note {
            validate::note_content(note)?;
        }
        let now = self.clock.epoch_ms();

        self.store.with_tx(|tx| {
            let Some(session) = sessions::get(tx, id).map_err(StorageError::from)? else {
                return Err(not_found(id));
            };
            if session.status != "active" {
                return Ok(EndOutcome { status: session.status, released_files: Vec::new() });
            }
            sessions::finish(tx, id, &status, now).map_err(StorageError::from)?;
            let released_files =
                sessions::release_all_files(tx, id, now).map_err(StorageError::from)?;
            if let Some(note) = note {
                sessions::insert_note(tx, id, note, "handoff", now)
                    .map_err(StorageError::from)?;
            }
            Ok(EndOutcome { status, released_files })
        })
    }

    /// Hard delete; CASCADE removes claims and notes.
    pub fn remove(&self, id: &str) -> Result<bool, ApiError> {
        Ok(self
            .store
            .with_tx::<_, ApiError>(|tx| {
                Ok(sessions::delete(tx, id).map_err(StorageError::from)?)
            })?)
    }

    /// Claim more files for an active session.
    pub fn claim_files(
        &self,
        id: &str,
        files: &[String],
        force: bool,
    ) -> Result<StartOutcome, ApiError> {
        if files.is_empty() {
            return Err(ApiError::validation("files must not be empty"));
        }
        check_paths(files)?;
        let now = self.clock.epoch_ms();

        self.store.with_tx(|tx| {
            let session = require_active(tx, id)?;
            let displaced = if force {
                sessions::force_release_paths(tx, files, Some(&session.id), now)
                    .map_err(StorageError::from)?
            } else {
                let conflicts = sessions::conflicts_for(tx, files, Some(&session.id))
                    .map_err(StorageError::from)?;
                if !conflicts.is_empty() {
                    return Err(conflict_error(&conflicts));
                }
                Vec::new()
            };
            // Re-claiming a path this session already holds stays a no-op.
            let held = sessions::unreleased_files(tx, id).map_err(StorageError::from)?;
            let fresh: Vec<String> =
                files.iter().filter(|f| !held.contains(f)).cloned().collect();
            sessions::claim_files(tx, id, &fresh, now).map_err(StorageError::from)?;
            sessions::touch(tx, id, now).map_err(StorageError::from)?;
            Ok(StartOutcome { id: session.id, claimed: fresh, displaced })
        })
    }

    /// Release claims held by this session.
    pub fn release_files(&self, id: &str, files: &[String]) -> Result<Vec<String>, ApiError> {
        if files.is_empty() {
            return Err(ApiError::validation("files must not be empty"));
        }
        let now = self.clock.epoch_ms();
        self.store.with_tx(|tx| {
            require_active(tx, id)?;
            let released =
                sessions::release_files(tx, id, files, now).map_err(StorageError::from)?;
            sessions::touch(tx, id, now).map_err(StorageError::from)?;
            Ok(released)
        })
    }

    /// Append a note to a session.
    pub fn add_note(&self, id: &str, content: &str, kind: Option<&str>) -> Result<i64, ApiError> {
        validate::note_content(content)?;
        let kind = kind.unwrap_or("note");
        let now = self.clock.epoch_ms();
        self.store.with_tx(|tx| {
            if sessions::get(tx, id).map_err(StorageError::from)?.is_none() {
                return Err(not_found(id));
            }
            let note_id =
                sessions::insert_note(tx, id, content, kind, now).map_err(StorageError::from)?;
            sessions::touch(tx, id, now).map_err(StorageError::from)?;
            Ok(note_id)
        })
    }

    /// Note onto the caller's active session, creating one when needed.
    pub fn quick_note(
        &self,
        content: &str,
        agent_id: Option<&str>,
        kind: Option<&str>,
    ) -> Result<QuickNoteOutcome, ApiError> {
        validate::note_content(content)?;
        let kind = kind.unwrap_or("note");
        let now = self.clock.epoch_ms();

        self.store.with_tx(|tx| {
            let existing = match agent_id {
                Some(agent) => {
                    sessions::active_for_agent(tx, agent).map_err(StorageError::from)?
                }
                None => None,
            };
            let (session_id, created) = match existing {
                Some(session) => (session.id, false),
                None => {
                    let id = ids::session_id();
                    sessions::insert(tx, &id, "Quick note", agent_id, None, None, now)
                        .map_err(StorageError::from)?;
                    (id, true)
                }
            };
            let note_id = sessions::insert_note(tx, &session_id, content, kind, now)
                .map_err(StorageError::from)?;
            sessions::touch(tx, &session_id, now).map_err(StorageError::from)?;
            Ok(QuickNoteOutcome { note_id, session_id, session_created: created })
        })
    }

    /// The conflict primitive behind both the UI and the `force` check.
    pub fn conflicts(&self, files: &[String]) -> Result<Vec<Conflict>, ApiError> {
        Ok(self.store.with_conn(|conn| sessions::conflicts_for(conn, files, None))?)
    }

    pub fn get(&self, id: &str) -> Result<Option<SessionInfo>, ApiError> {
        let Some(row) = self.store.with_conn(|conn| sessions::get(conn, id))? else {
            return Ok(None);
        };
        let files = self.store.with_conn(|conn| sessions::unreleased_files(conn, id))?;
        Ok(Some(to_info(row, files)))
    }

    pub fn list(&self, filter: &SessionFilter) -> Result<Vec<SessionInfo>, ApiError> {
        let rows = self.store.with_conn(|conn| sessions::list(conn, filter))?;
        let mut infos = Vec::with_capacity(rows.len());
        for row in rows {
            let files =
                self.store.with_conn(|conn| sessions::unreleased_files(conn, &row.id))?;
            infos.push(to_info(row, files));
        }
        Ok(infos)
    }

    pub fn notes(&self, id: &str, limit: u32) -> Result<Vec<SessionNoteInfo>, ApiError> {
        if self.store.with_conn(|conn| sessions::get(conn, id))?.is_none() {
            return Err(not_found(id));
        }
        let rows = self.store.with_conn(|conn| sessions::list_notes(conn, id, limit))?;
        Ok(rows
            .into_iter()
            .map(|row| SessionNoteInfo {
                id: row.id,
                session_id: row.session_id,
                content: row.content,
                kind: row.kind,
                created_at: row.created_at,
            })
            .collect())
    }
}

/// Stable hash of an absolute working-directory path.
pub fn worktree_id(cwd: &str) -> String {
    let digest = Sha256::digest(cwd.as_bytes());
    hex_prefix(&digest, 16)
}

fn hex_prefix(bytes: &[u8], chars: usize) -> String {
    let mut out = String::with_capacity(chars);
    for byte in bytes {
        for nibble in [byte >> 4, byte & 0xf] {
            out.push(char::from_digit(u32::from(nibble), 16).unwrap_or('0'));
            if out.len() == chars {
                return out;
            }
        }
    }
    out
}

fn check_paths(files: &[String]) -> Result<(), ApiError> {
    for file in files {
        if file.trim().is_empty() {
            return Err(ApiError::validation("file paths must not be empty"));
        }
        if file.len() > 4096 {
            return Err(ApiError::validation("file path too long"));
        }
    }
    Ok(())
}

fn require_active(conn: &pd_storage::Connection, id: &str) -> Result<SessionRow, ApiError> {
    let Some(session) = sessions::get(conn, id).map_err(StorageError::from)? else {
        return Err(not_found(id));
    };
    if session.status != "active" {
        return Err(ApiError::validation(format!(
            "session {:?} is {}, not active",
            id, session.status
        )));
    }
    Ok(session)
}

fn not_found(id: &str) -> ApiError {
    ApiError::new(ErrorKind::SessionNotFound, format!("no session {:?}", id))
}

fn conflict_error(conflicts: &[Conflict]) -> ApiError {
    let detail: Vec<serde_json::Value> = conflicts
        .iter()
        .map(|c| serde_json::json!({ "path": c.path, "sessionId": c.session_id }))
        .collect();
    ApiError::new(
        ErrorKind::FileConflict,
        format!("{} file(s) already claimed", conflicts.len()),
    )
    .with_detail(serde_json::json!({ "conflicts": detail }))
}

fn to_info(row: SessionRow, files: Vec<String>) -> SessionInfo {
    SessionInfo {
        id: row.id,
        purpose: row.purpose,
        status: row.status,
        agent_id: row.agent_id,
        worktree_id: row.worktree_id,
        created_at: row.created_at,
        updated_at: row.updated_at,
        completed_at: row.completed_at,
        files,
        metadata: row.metadata.and_then(|m| serde_json::from_str(&m).ok()),
    }
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
