// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock endpoints.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use pd_core::{ActivityKind, Clock, WebhookEvent};
use pd_wire::{LockAcquireRequest, LockExtendRequest, LockReleaseRequest};

use crate::http::extract::{header_pid, json_body};
use crate::http::{AppState, HttpResult};
use crate::metrics::Metrics;

pub async fn acquire<C: Clock>(
    State(state): State<AppState<C>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResult<Json<serde_json::Value>> {
    let request: LockAcquireRequest = json_body(&headers, &body)?;
    let pid = match header_pid(&headers)? {
        Some(pid) => Some(pid),
        None => request.pid.map(pd_core::validate::pid).transpose()?,
    };
    if let Some(owner) = &request.owner {
        state.agents.can_acquire_lock(owner)?;
    }

    let outcome =
        state.locks.acquire(&name, request.owner, request.ttl, pid, request.metadata.as_ref())?;

    Metrics::bump(&state.metrics.locks_acquired_total);
    state.activity.log(
        ActivityKind::LockAcquire,
        Some(&outcome.owner),
        Some(&name),
        &format!("until {}", outcome.expires_at),
        None,
    );
    state.webhooks.trigger(
        WebhookEvent::LockAcquire,
        serde_json::json!({"name": name, "owner": outcome.owner, "expiresAt": outcome.expires_at}),
        Some(&name),
    );

    Ok(Json(serde_json::json!({
        "success": true,
        "owner": outcome.owner,
        "acquiredAt": outcome.acquired_at,
        "expiresAt": outcome.expires_at,
    })))
}

pub async fn release<C: Clock>(
    State(state): State<AppState<C>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResult<Json<serde_json::Value>> {
    let request: LockReleaseRequest = json_body(&headers, &body)?;
    let pid = header_pid(&headers)?;
    let released = state.locks.release(&name, request.owner.clone(), pid, request.force)?;

    if released {
        state.activity.log(
            ActivityKind::LockRelease,
            request.owner.as_deref(),
            Some(&name),
            if request.force { "forced" } else { "released" },
            None,
        );
        state.webhooks.trigger(
            WebhookEvent::LockRelease,
            serde_json::json!({"name": name, "forced": request.force}),
            Some(&name),
        );
    }
    Ok(Json(serde_json::json!({ "success": true, "released": released })))
}

pub async fn extend<C: Clock>(
    State(state): State<AppState<C>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResult<Json<serde_json::Value>> {
    let request: LockExtendRequest = json_body(&headers, &body)?;
    let pid = header_pid(&headers)?;
    let outcome = state.locks.extend(&name, request.owner, request.ttl, pid)?;
    Ok(Json(serde_json::json!({
        "success": true,
        "expiresAt": outcome.expires_at,
    })))
}

pub async fn get_one<C: Clock>(
    State(state): State<AppState<C>>,
    Path(name): Path<String>,
) -> HttpResult<Json<pd_wire::LockInfo>> {
    Ok(Json(state.locks.get(&name)?))
}

#[derive(Debug, Deserialize)]
pub struct LocksQuery {
    owner: Option<String>,
}

pub async fn list<C: Clock>(
    State(state): State<AppState<C>>,
    Query(query): Query<LocksQuery>,
) -> HttpResult<Json<serde_json::Value>> {
    let locks = state.locks.list(query.owner.as_deref())?;
    Ok(Json(serde_json::json!({ "count": locks.len(), "locks": locks })))
}
