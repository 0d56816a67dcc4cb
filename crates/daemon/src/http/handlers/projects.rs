// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project record endpoints.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;

use pd_core::Clock;
use pd_wire::ProjectUpsertRequest;

use crate::http::extract::json_body;
use crate::http::{AppState, HttpResult};

fn project_json(row: &pd_storage::projects::ProjectRow) -> serde_json::Value {
    serde_json::json!({
        "id": row.id,
        "root": row.root,
        "type": row.kind,
        "config": row.config.as_deref().and_then(|c| serde_json::from_str::<serde_json::Value>(c).ok()),
        "services": row.services.as_deref().and_then(|s| serde_json::from_str::<serde_json::Value>(s).ok()),
        "lastScanned": row.last_scanned,
        "createdAt": row.created_at,
    })
}

pub async fn upsert<C: Clock>(
    State(state): State<AppState<C>>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResult<Json<serde_json::Value>> {
    let request: ProjectUpsertRequest = json_body(&headers, &body)?;
    let args = crate::registry::projects::ProjectUpsert {
        id: request.id.clone(),
        root: request.root,
        kind: request.kind,
        config: request.config,
        services: request.services,
        metadata: request.metadata,
    };
    state.projects.upsert(&args)?;
    Ok(Json(serde_json::json!({ "success": true, "id": request.id })))
}

pub async fn list<C: Clock>(
    State(state): State<AppState<C>>,
) -> HttpResult<Json<serde_json::Value>> {
    let projects = state.projects.list()?;
    let rows: Vec<serde_json::Value> = projects.iter().map(project_json).collect();
    Ok(Json(serde_json::json!({ "count": rows.len(), "projects": rows })))
}

pub async fn get_one<C: Clock>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> HttpResult<Json<serde_json::Value>> {
    let project = state.projects.get(&id)?;
    Ok(Json(serde_json::json!({ "success": true, "project": project_json(&project) })))
}

pub async fn remove<C: Clock>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> HttpResult<Json<serde_json::Value>> {
    let removed = state.projects.remove(&id)?;
    if !removed {
        return Err(pd_core::ApiError::new(
            pd_core::ErrorKind::ServiceNotFound,
            format!("no project {:?}", id),
        )
        .into());
    }
    Ok(Json(serde_json::json!({ "success": true })))
}
