// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schema creation and startup reclamation.
//!
//! All DDL is idempotent; the daemon runs it on every start.

use rusqlite::Connection;
use tracing::warn;

use crate::store::StorageError;

const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS services (
    identity    TEXT PRIMARY KEY,
    project     TEXT NOT NULL,
    stack       TEXT,
    context     TEXT,
    port        INTEGER NOT NULL UNIQUE,
    pid         INTEGER,
    cmd         TEXT,
    cwd         TEXT,
    status      TEXT NOT NULL DEFAULT 'assigned',
    pair        TEXT,
    metadata    TEXT,
    created_at  INTEGER NOT NULL,
    last_seen   INTEGER NOT NULL,
    expires_at  INTEGER,
    agent_id    TEXT
);

CREATE TABLE IF NOT EXISTS service_endpoints (
    identity    TEXT NOT NULL REFERENCES services(identity) ON DELETE CASCADE,
    env         TEXT NOT NULL,
    url         TEXT NOT NULL,
    PRIMARY KEY (identity, env)
);

CREATE TABLE IF NOT EXISTS locks (
    name        TEXT PRIMARY KEY,
    owner       TEXT NOT NULL,
    pid         INTEGER,
    acquired_at INTEGER NOT NULL,
    expires_at  INTEGER NOT NULL,
    metadata    TEXT
);

CREATE TABLE IF NOT EXISTS messages (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    channel     TEXT NOT NULL,
    payload     TEXT NOT NULL,
    sender      TEXT,
    created_at  INTEGER NOT NULL,
    expires_at  INTEGER
);

CREATE TABLE IF NOT EXISTS agents (
    id              TEXT PRIMARY KEY,
    name            TEXT,
    kind            TEXT NOT NULL DEFAULT 'cli',
    pid             INTEGER,
    project         TEXT,
    stack           TEXT,
    context         TEXT,
    registered_at   INTEGER NOT NULL,
    last_heartbeat  INTEGER NOT NULL,
    max_services    INTEGER NOT NULL,
    max_locks       INTEGER NOT NULL,
    metadata        TEXT
);

CREATE TABLE IF NOT EXISTS sessions (
    id           TEXT PRIMARY KEY,
    purpose      TEXT NOT NULL,
    status       TEXT NOT NULL DEFAULT 'active',
    agent_id     TEXT,
    worktree_id  TEXT,
    metadata     TEXT,
    created_at   INTEGER NOT NULL,
    updated_at   INTEGER NOT NULL,
    completed_at INTEGER
);

CREATE TABLE IF NOT EXISTS session_files (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id  TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    file_path   TEXT NOT NULL,
    claimed_at  INTEGER NOT NULL,
    released_at INTEGER
);

CREATE TABLE IF NOT EXISTS session_notes (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id  TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    content     TEXT NOT NULL,
    kind        TEXT NOT NULL DEFAULT 'note',
    created_at  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS webhooks (
    id             TEXT PRIMARY KEY,
    url            TEXT NOT NULL,
    secret         TEXT,
    events         TEXT NOT NULL,
    filter_pattern TEXT,
    active         INTEGER NOT NULL DEFAULT 1,
    success_count  INTEGER NOT NULL DEFAULT 0,
    failure_count  INTEGER NOT NULL DEFAULT 0,
    created_at     INTEGER NOT NULL,
    metadata       TEXT
);

CREATE TABLE IF NOT EXISTS webhook_deliveries (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    webhook_id    TEXT NOT NULL REFERENCES webhooks(id) ON DELETE CASCADE,
    event         TEXT NOT NULL,
    payload       TEXT NOT NULL,
    status        TEXT NOT NULL DEFAULT 'pending',
    attempts      INTEGER NOT NULL DEFAULT 0,
    response_code INTEGER,
    response_body TEXT,
    created_at    INTEGER NOT NULL,
    updated_at    INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS resurrection (
    agent_id   TEXT PRIMARY KEY,
    project    TEXT,
    stack      TEXT,
    context    TEXT,
    purpose    TEXT,
    session_id TEXT,
    status     TEXT NOT NULL DEFAULT 'stale',
    stale_at   INTEGER NOT NULL,
    dead_at    INTEGER,
    claimed_by TEXT
);

CREATE TABLE IF NOT EXISTS activity (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp INTEGER NOT NULL,
    kind      TEXT NOT NULL,
    agent_id  TEXT,
    target    TEXT,
    details   TEXT NOT NULL DEFAULT '',
    metadata  TEXT
);

CREATE TABLE IF NOT EXISTS projects (
    id           TEXT PRIMARY KEY,
    root         TEXT NOT NULL,
    kind         TEXT,
    config       TEXT,
    services     TEXT,
    last_scanned INTEGER,
    created_at   INTEGER NOT NULL,
    metadata     TEXT
);

CREATE INDEX IF NOT EXISTS idx_services_prefix ON services(project, stack, context);
CREATE INDEX IF NOT EXISTS idx_services_expires ON services(expires_at);
CREATE INDEX IF NOT EXISTS idx_messages_channel ON messages(channel, id);
CREATE INDEX IF NOT EXISTS idx_messages_expires ON messages(expires_at);
CREATE INDEX IF NOT EXISTS idx_locks_expires ON locks(expires_at);
CREATE INDEX IF NOT EXISTS idx_session_files_path ON session_files(file_path) WHERE released_at IS NULL;
CREATE INDEX IF NOT EXISTS idx_session_files_session ON session_files(session_id);
CREATE INDEX IF NOT EXISTS idx_session_notes_session ON session_notes(session_id);
CREATE INDEX IF NOT EXISTS idx_sessions_agent ON sessions(agent_id, updated_at);
CREATE INDEX IF NOT EXISTS idx_activity_timestamp ON activity(timestamp);
CREATE INDEX IF NOT EXISTS idx_deliveries_status ON webhook_deliveries(status);
"#;

/// Indexes that must exist after `create`; checked on every start.
const REQUIRED_INDEXES: &[&str] = &[
    "idx_services_prefix",
    "idx_messages_channel",
    "idx_session_files_path",
    "idx_sessions_agent",
    "idx_activity_timestamp",
    "idx_deliveries_status",
];

/// Run idempotent schema creation.
pub fn create(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(DDL)?;
    Ok(())
}

/// Verify that the required indexes exist.
pub fn verify_indexes(conn: &Connection) -> Result<(), StorageError> {
    let mut stmt =
        conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1")?;
    for name in REQUIRED_INDEXES {
        if !stmt.exists([name])? {
            return Err(StorageError::MissingIndex((*name).to_string()));
        }
    }
    Ok(())
}

/// Delete rows whose FK target no longer exists.
///
/// Foreign keys normally prevent this, but a database written with
/// `foreign_keys=OFF` (older daemon, manual edits) can carry strays.
pub fn reclaim_orphans(conn: &Connection) -> Result<(), StorageError> {
    let files = conn.execute(
        "DELETE FROM session_files WHERE session_id NOT IN (SELECT id FROM sessions)",
        [],
    )?;
    let notes = conn.execute(
        "DELETE FROM session_notes WHERE session_id NOT IN (SELECT id FROM sessions)",
        [],
    )?;
    let endpoints = conn.execute(
        "DELETE FROM service_endpoints WHERE identity NOT IN (SELECT identity FROM services)",
        [],
    )?;
    let deliveries = conn.execute(
        "DELETE FROM webhook_deliveries WHERE webhook_id NOT IN (SELECT id FROM webhooks)",
        [],
    )?;
    let total = files + notes + endpoints + deliveries;
    if total > 0 {
        warn!(reclaimed = total, "deleted orphaned rows on startup");
    }
    Ok(())
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
