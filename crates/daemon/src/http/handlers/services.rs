// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service lease endpoints.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use pd_core::{ActivityKind, ApiError, Clock, WebhookEvent};
use pd_wire::{ClaimRequest, ClaimResponse, EndpointRequest, ReleaseRequest, ReleaseResponse};

use crate::http::extract::{header_pid, json_body};
use crate::http::{AppState, HttpResult};
use crate::metrics::Metrics;

pub async fn claim<C: Clock>(
    State(state): State<AppState<C>>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResult<Json<ClaimResponse>> {
    let request: ClaimRequest = json_body(&headers, &body)?;
    let pid = match header_pid(&headers)? {
        Some(pid) => Some(pid),
        None => request.pid.map(pd_core::validate::pid).transpose()?,
    };
    if let Some(agent_id) = &request.agent_id {
        state.agents.can_claim_service(agent_id)?;
    }

    let args = crate::registry::services::ClaimArgs {
        id: request.id,
        port: request.port,
        range: request.range.map(|r| (r.start, r.end)),
        expires_ms: request.expires,
        pair: request.pair,
        cmd: request.cmd,
        cwd: request.cwd,
        pid,
        agent_id: request.agent_id,
        metadata: request.metadata,
    };
    let outcome = state.services.claim(&args)?;

    Metrics::bump(&state.metrics.claims_total);
    state.activity.log(
        ActivityKind::ServiceClaim,
        args.agent_id.as_deref(),
        Some(&outcome.id),
        &format!("port {} ({})", outcome.port, if outcome.existing { "renewed" } else { "new" }),
        None,
    );
    state.webhooks.trigger(
        WebhookEvent::ServiceClaim,
        serde_json::json!({"id": outcome.id, "port": outcome.port, "existing": outcome.existing}),
        Some(&outcome.id),
    );

    Ok(Json(ClaimResponse {
        success: true,
        id: outcome.id,
        port: outcome.port,
        existing: outcome.existing,
    }))
}

fn release_response<C: Clock>(
    state: &AppState<C>,
    released: Vec<pd_storage::services::ReleasedLease>,
) -> ReleaseResponse {
    Metrics::bump(&state.metrics.releases_total);
    for lease in &released {
        state.activity.log(
            ActivityKind::ServiceRelease,
            None,
            Some(&lease.identity),
            &format!("port {}", lease.port),
            None,
        );
        state.webhooks.trigger(
            WebhookEvent::ServiceRelease,
            serde_json::json!({"id": lease.identity, "port": lease.port}),
            Some(&lease.identity),
        );
    }
    let count = released.len() as u64;
    ReleaseResponse {
        success: true,
        released: count,
        released_ports: released.iter().map(|l| l.port).collect(),
        message: format!("released {} lease(s)", count),
    }
}

pub async fn release<C: Clock>(
    State(state): State<AppState<C>>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResult<Json<ReleaseResponse>> {
    let request: ReleaseRequest = json_body(&headers, &body)?;
    let outcome = if request.expired {
        state.services.release_expired()?
    } else {
        let Some(id) = request.id else {
            return Err(ApiError::validation("release needs an id or expired=true").into());
        };
        state.services.release(&id)?
    };
    Ok(Json(release_response(&state, outcome.released)))
}

pub async fn release_one<C: Clock>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> HttpResult<Json<ReleaseResponse>> {
    let outcome = state.services.release(&id)?;
    Ok(Json(release_response(&state, outcome.released)))
}

#[derive(Debug, Deserialize)]
pub struct ServicesQuery {
    pattern: Option<String>,
    status: Option<String>,
    port: Option<u16>,
    #[serde(default)]
    expired: bool,
}

pub async fn list<C: Clock>(
    State(state): State<AppState<C>>,
    Query(query): Query<ServicesQuery>,
) -> HttpResult<Json<serde_json::Value>> {
    let services =
        state.services.find(query.pattern.as_deref(), query.status, query.port, query.expired)?;
    Ok(Json(serde_json::json!({
        "success": true,
        "count": services.len(),
        "services": services,
    })))
}

pub async fn get_one<C: Clock>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> HttpResult<Json<serde_json::Value>> {
    let Some(service) = state.services.get(&id)? else {
        return Err(ApiError::new(
            pd_core::ErrorKind::ServiceNotFound,
            format!("no service {:?}", id),
        )
        .into());
    };
    Ok(Json(serde_json::json!({ "success": true, "service": service })))
}

pub async fn set_endpoint<C: Clock>(
    State(state): State<AppState<C>>,
    Path((id, env)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResult<Json<serde_json::Value>> {
    let request: EndpointRequest = json_body(&headers, &body)?;
    state.services.set_endpoint(&id, &env, &request.url)?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn active_ports<C: Clock>(
    State(state): State<AppState<C>>,
) -> HttpResult<Json<serde_json::Value>> {
    let ports = state.services.active_ports()?;
    Ok(Json(serde_json::json!({
        "success": true,
        "count": ports.len(),
        "ports": ports,
    })))
}

/// Release expired leases and leases whose owning pid is gone.
pub async fn cleanup<C: Clock>(
    State(state): State<AppState<C>>,
) -> HttpResult<Json<serde_json::Value>> {
    let freed = state.services.cleanup()?;
    let response = release_response(&state, freed);
    Ok(Json(serde_json::json!({
        "success": true,
        "freed": response.released_ports,
        "count": response.released,
    })))
}
