// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resurrection queue endpoints.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use pd_core::{ActivityKind, Clock};
use pd_wire::ResurrectionCompleteRequest;

use crate::http::extract::json_body;
use crate::http::{AppState, HttpResult};

#[derive(Debug, Deserialize)]
pub struct ResurrectionQuery {
    project: Option<String>,
    stack: Option<String>,
    status: Option<String>,
}

pub async fn list<C: Clock>(
    State(state): State<AppState<C>>,
    Query(query): Query<ResurrectionQuery>,
) -> HttpResult<Json<serde_json::Value>> {
    let entries = state.resurrection.list(
        query.project.as_deref(),
        query.stack.as_deref(),
        query.status.as_deref(),
    )?;
    Ok(Json(serde_json::json!({ "count": entries.len(), "entries": entries })))
}

pub async fn pending<C: Clock>(
    State(state): State<AppState<C>>,
    Query(query): Query<ResurrectionQuery>,
) -> HttpResult<Json<serde_json::Value>> {
    let entries =
        state.resurrection.pending(query.project.as_deref(), query.stack.as_deref())?;
    Ok(Json(serde_json::json!({ "count": entries.len(), "entries": entries })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimBody {
    claimed_by: Option<String>,
}

pub async fn claim<C: Clock>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResult<Json<serde_json::Value>> {
    let request: ClaimBody = json_body(&headers, &body)?;
    let entry = state.resurrection.claim(&id, request.claimed_by.as_deref())?;
    state.activity.log(
        ActivityKind::ResurrectionClaim,
        request.claimed_by.as_deref(),
        Some(&id),
        "claimed for resurrection",
        None,
    );
    Ok(Json(serde_json::json!({ "success": true, "entry": entry })))
}

pub async fn complete<C: Clock>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResult<Json<serde_json::Value>> {
    let request: ResurrectionCompleteRequest = json_body(&headers, &body)?;
    let moved = state.resurrection.complete(&id, &request.new_agent_id)?;
    state.activity.log(
        ActivityKind::ResurrectionComplete,
        Some(&request.new_agent_id),
        Some(&id),
        &format!("re-parented {} session(s)", moved),
        None,
    );
    Ok(Json(serde_json::json!({ "success": true, "reparentedSessions": moved })))
}

pub async fn abandon<C: Clock>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> HttpResult<Json<serde_json::Value>> {
    state.resurrection.abandon(&id)?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn dismiss<C: Clock>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> HttpResult<Json<serde_json::Value>> {
    state.resurrection.dismiss(&id)?;
    Ok(Json(serde_json::json!({ "success": true })))
}
