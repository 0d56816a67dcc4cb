// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activity-log endpoints.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use pd_core::Clock;
use pd_storage::activity::ActivityFilter;

use crate::http::{AppState, HttpResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityQuery {
    limit: Option<u32>,
    #[serde(rename = "type")]
    kind: Option<String>,
    agent_id: Option<String>,
    since: Option<u64>,
    until: Option<u64>,
}

pub async fn recent<C: Clock>(
    State(state): State<AppState<C>>,
    Query(query): Query<ActivityQuery>,
) -> HttpResult<Json<serde_json::Value>> {
    let filter = ActivityFilter {
        kind: query.kind,
        agent_id: query.agent_id,
        since: query.since,
        until: query.until,
        limit: query.limit.unwrap_or(100).min(1000),
    };
    let entries = state.activity.recent(&filter)?;
    Ok(Json(serde_json::json!({ "count": entries.len(), "activity": entries })))
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    since: Option<u64>,
}

pub async fn summary<C: Clock>(
    State(state): State<AppState<C>>,
    Query(query): Query<SummaryQuery>,
) -> HttpResult<Json<serde_json::Value>> {
    let since = query.since.unwrap_or(0);
    let counts = state.activity.summary(since)?;
    let by_type: serde_json::Map<String, serde_json::Value> = counts
        .into_iter()
        .map(|(kind, count)| (kind, serde_json::json!(count)))
        .collect();
    Ok(Json(serde_json::json!({ "since": since, "byType": by_type })))
}
