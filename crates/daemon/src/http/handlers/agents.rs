// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent endpoints.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use pd_core::{ActivityKind, ApiError, Clock, ErrorKind, WebhookEvent};
use pd_wire::AgentRegisterRequest;

use crate::http::extract::{header_pid, json_body};
use crate::http::{AppState, HttpResult};

pub async fn register<C: Clock>(
    State(state): State<AppState<C>>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResult<Json<serde_json::Value>> {
    let request: AgentRegisterRequest = json_body(&headers, &body)?;
    let pid = match header_pid(&headers)? {
        Some(pid) => Some(pid),
        None => request.pid.map(pd_core::validate::pid).transpose()?,
    };
    let args = crate::registry::agents::RegisterArgs {
        id: request.id.clone(),
        name: request.name,
        kind: request.kind,
        pid,
        identity: request.identity,
        max_services: request.max_services,
        max_locks: request.max_locks,
        metadata: request.metadata,
    };
    let registered = state.agents.register(&args)?;

    if registered {
        state.activity.log(
            ActivityKind::AgentRegister,
            Some(&request.id),
            None,
            "registered",
            None,
        );
        state.webhooks.trigger(
            WebhookEvent::AgentRegister,
            serde_json::json!({"agentId": request.id}),
            None,
        );
    }
    Ok(Json(serde_json::json!({ "success": true, "registered": registered })))
}

pub async fn heartbeat<C: Clock>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> HttpResult<Json<serde_json::Value>> {
    state.agents.heartbeat(&id)?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn unregister<C: Clock>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> HttpResult<Json<serde_json::Value>> {
    let unregistered = state.agents.unregister(&id)?;
    if unregistered {
        state.activity.log(
            ActivityKind::AgentUnregister,
            Some(&id),
            None,
            "unregistered",
            None,
        );
        state.webhooks.trigger(
            WebhookEvent::AgentUnregister,
            serde_json::json!({"agentId": id}),
            None,
        );
    }
    Ok(Json(serde_json::json!({ "success": true, "unregistered": unregistered })))
}

#[derive(Debug, Deserialize)]
pub struct AgentsQuery {
    #[serde(default)]
    active: bool,
}

pub async fn list<C: Clock>(
    State(state): State<AppState<C>>,
    Query(query): Query<AgentsQuery>,
) -> HttpResult<Json<serde_json::Value>> {
    let agents = state.agents.list(query.active)?;
    Ok(Json(serde_json::json!({ "count": agents.len(), "agents": agents })))
}

pub async fn get_one<C: Clock>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> HttpResult<Json<serde_json::Value>> {
    let Some(agent) = state.agents.get(&id)? else {
        return Err(
            ApiError::new(ErrorKind::ServiceNotFound, format!("no agent {:?}", id)).into()
        );
    };
    Ok(Json(serde_json::json!({ "success": true, "agent": agent })))
}
