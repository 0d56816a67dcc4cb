// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon self-reporting: health, version, metrics.

use axum::extract::State;
use axum::Json;

use pd_core::Clock;
use pd_wire::{HealthResponse, VersionResponse};

use crate::env::VERSION;
use crate::http::{AppState, HttpResult};

pub async fn health<C: Clock>(
    State(state): State<AppState<C>>,
) -> HttpResult<Json<HealthResponse>> {
    let active_ports = state.services.count()?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: VERSION.to_string(),
        uptime_seconds: state.started.elapsed().as_secs(),
        active_ports,
        pid: std::process::id(),
    }))
}

pub async fn version<C: Clock>(
    State(state): State<AppState<C>>,
) -> HttpResult<Json<VersionResponse>> {
    Ok(Json(VersionResponse {
        version: VERSION.to_string(),
        code_hash: option_env!("BUILD_GIT_HASH").unwrap_or("unknown").to_string(),
        started_at: state.started_at_ms,
        pid: std::process::id(),
        uptime: state.started.elapsed().as_millis() as u64,
    }))
}

pub async fn metrics<C: Clock>(
    State(state): State<AppState<C>>,
) -> HttpResult<Json<serde_json::Value>> {
    let mut counters = state.metrics.snapshot();
    if let Some(map) = counters.as_object_mut() {
        map.insert("active_leases".to_string(), serde_json::json!(state.services.count()?));
        map.insert(
            "stored_messages".to_string(),
            serde_json::json!(state.messaging.message_count()?),
        );
        map.insert(
            "activity_entries".to_string(),
            serde_json::json!(state.activity.count()?),
        );
    }
    Ok(Json(counters))
}
