// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session, file-claim, and note endpoints.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use pd_core::{ActivityKind, ApiError, Clock};
use pd_storage::sessions::SessionFilter;
use pd_wire::{
    NoteRequest, QuickNoteRequest, SessionFilesClaimRequest, SessionFilesReleaseRequest,
    SessionStartRequest, SessionUpdateRequest,
};

use crate::http::extract::json_body;
use crate::http::{AppState, HttpResult};

fn conflicts_json(conflicts: &[pd_storage::sessions::Conflict]) -> serde_json::Value {
    conflicts
        .iter()
        .map(|c| serde_json::json!({ "path": c.path, "sessionId": c.session_id }))
        .collect()
}

pub async fn start<C: Clock>(
    State(state): State<AppState<C>>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResult<Json<serde_json::Value>> {
    let request: SessionStartRequest = json_body(&headers, &body)?;
    let args = crate::registry::sessions::StartArgs {
        purpose: request.purpose.clone(),
        agent_id: request.agent_id.clone(),
        files: request.files,
        force: request.force,
        cwd: request.cwd,
        metadata: request.metadata,
    };
    let outcome = state.sessions.start(&args)?;

    state.activity.log(
        ActivityKind::SessionStart,
        args.agent_id.as_deref(),
        Some(&outcome.id),
        &request.purpose,
        Some(&serde_json::json!({"files": outcome.claimed.len()})),
    );

    Ok(Json(serde_json::json!({
        "success": true,
        "id": outcome.id,
        "claimed": outcome.claimed,
        "displaced": conflicts_json(&outcome.displaced),
    })))
}

pub async fn update<C: Clock>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResult<Json<serde_json::Value>> {
    let request: SessionUpdateRequest = json_body(&headers, &body)?;
    let outcome = state.sessions.end(&id, request.status.as_deref(), request.note.as_deref())?;

    state.activity.log(
        ActivityKind::SessionEnd,
        None,
        Some(&id),
        &outcome.status,
        Some(&serde_json::json!({"releasedFiles": outcome.released_files.len()})),
    );

    Ok(Json(serde_json::json!({
        "success": true,
        "status": outcome.status,
        "releasedFiles": outcome.released_files,
    })))
}

pub async fn remove<C: Clock>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> HttpResult<Json<serde_json::Value>> {
    let removed = state.sessions.remove(&id)?;
    if !removed {
        return Err(ApiError::new(
            pd_core::ErrorKind::SessionNotFound,
            format!("no session {:?}", id),
        )
        .into());
    }
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn get_one<C: Clock>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> HttpResult<Json<serde_json::Value>> {
    let Some(session) = state.sessions.get(&id)? else {
        return Err(ApiError::new(
            pd_core::ErrorKind::SessionNotFound,
            format!("no session {:?}", id),
        )
        .into());
    };
    Ok(Json(serde_json::json!({ "success": true, "session": session })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsQuery {
    status: Option<String>,
    agent_id: Option<String>,
    worktree: Option<String>,
}

pub async fn list<C: Clock>(
    State(state): State<AppState<C>>,
    Query(query): Query<SessionsQuery>,
) -> HttpResult<Json<serde_json::Value>> {
    let filter = SessionFilter {
        status: query.status,
        agent_id: query.agent_id,
        worktree_id: query.worktree,
    };
    let sessions = state.sessions.list(&filter)?;
    Ok(Json(serde_json::json!({ "count": sessions.len(), "sessions": sessions })))
}

pub async fn add_note<C: Clock>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResult<Json<serde_json::Value>> {
    let request: NoteRequest = json_body(&headers, &body)?;
    let note_id = state.sessions.add_note(&id, &request.content, request.kind.as_deref())?;
    state.activity.log(ActivityKind::SessionNote, None, Some(&id), "note added", None);
    Ok(Json(serde_json::json!({ "success": true, "noteId": note_id })))
}

#[derive(Debug, Deserialize)]
pub struct NotesQuery {
    limit: Option<u32>,
}

pub async fn notes<C: Clock>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
    Query(query): Query<NotesQuery>,
) -> HttpResult<Json<serde_json::Value>> {
    let notes = state.sessions.notes(&id, query.limit.unwrap_or(50).min(500))?;
    Ok(Json(serde_json::json!({ "count": notes.len(), "notes": notes })))
}

pub async fn claim_files<C: Clock>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResult<Json<serde_json::Value>> {
    let request: SessionFilesClaimRequest = json_body(&headers, &body)?;
    let outcome = state.sessions.claim_files(&id, &request.files, request.force)?;

    for path in &outcome.claimed {
        state.activity.log(ActivityKind::FileClaim, None, Some(path), &id, None);
    }
    Ok(Json(serde_json::json!({
        "success": true,
        "claimed": outcome.claimed,
        "conflicts": conflicts_json(&outcome.displaced),
    })))
}

#[derive(Debug, Deserialize)]
pub struct ReleaseFilesQuery {
    paths: Option<String>,
}

pub async fn release_files<C: Clock>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
    Query(query): Query<ReleaseFilesQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResult<Json<serde_json::Value>> {
    let request: SessionFilesReleaseRequest = json_body(&headers, &body)?;
    let mut files = request.files;
    if files.is_empty() {
        if let Some(paths) = query.paths {
            files = paths.split(',').map(|s| s.trim().to_string()).collect();
        }
    }
    let released = state.sessions.release_files(&id, &files)?;
    for path in &released {
        state.activity.log(ActivityKind::FileRelease, None, Some(path), &id, None);
    }
    Ok(Json(serde_json::json!({ "success": true, "released": released })))
}

pub async fn quick_note<C: Clock>(
    State(state): State<AppState<C>>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResult<Json<serde_json::Value>> {
    let request: QuickNoteRequest = json_body(&headers, &body)?;
    let outcome = state.sessions.quick_note(
        &request.content,
        request.agent_id.as_deref(),
        request.kind.as_deref(),
    )?;
    state.activity.log(
        ActivityKind::SessionNote,
        request.agent_id.as_deref(),
        Some(&outcome.session_id),
        "quick note",
        None,
    );
    Ok(Json(serde_json::json!({
        "success": true,
        "noteId": outcome.note_id,
        "sessionId": outcome.session_id,
        "sessionCreated": outcome.session_created,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ConflictsQuery {
    files: String,
}

pub async fn conflicts<C: Clock>(
    State(state): State<AppState<C>>,
    Query(query): Query<ConflictsQuery>,
) -> HttpResult<Json<serde_json::Value>> {
    let files: Vec<String> =
        query.files.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    let conflicts = state.sessions.conflicts(&files)?;
    Ok(Json(serde_json::json!({
        "count": conflicts.len(),
        "conflicts": conflicts_json(&conflicts),
    })))
}
