// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health-wait endpoints.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use pd_core::Clock;
use pd_wire::WaitAllRequest;

use crate::http::extract::json_body;
use crate::http::{AppState, HttpResult};

#[derive(Debug, Deserialize)]
pub struct WaitQuery {
    timeout: Option<u64>,
}

pub async fn wait_one<C: Clock>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
    Query(query): Query<WaitQuery>,
) -> HttpResult<Json<serde_json::Value>> {
    let timeout = query.timeout.unwrap_or(30_000);
    let service = state.prober.wait_for(&id, timeout).await?;
    Ok(Json(serde_json::json!({ "success": true, "service": service })))
}

pub async fn wait_all<C: Clock>(
    State(state): State<AppState<C>>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResult<Json<pd_wire::WaitAllResponse>> {
    let request: WaitAllRequest = json_body(&headers, &body)?;
    let ids = if request.ids.is_empty() { request.services } else { request.ids };
    let timeout = request.timeout.unwrap_or(30_000);
    let outcome = state.prober.wait_for_all(&ids, timeout).await?;
    Ok(Json(outcome))
}
