// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook subscription endpoints.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use pd_core::{ApiError, Clock, ErrorKind};
use pd_wire::WebhookRegisterRequest;

use crate::http::extract::json_body;
use crate::http::{AppState, HttpResult};

pub async fn register<C: Clock>(
    State(state): State<AppState<C>>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResult<Json<serde_json::Value>> {
    let request: WebhookRegisterRequest = json_body(&headers, &body)?;
    let id = state.webhooks.register(
        &request.url,
        &request.events,
        request.secret.as_deref(),
        request.filter_pattern.as_deref(),
        request.metadata.as_ref(),
    )?;
    Ok(Json(serde_json::json!({ "success": true, "id": id })))
}

pub async fn list<C: Clock>(
    State(state): State<AppState<C>>,
) -> HttpResult<Json<serde_json::Value>> {
    let webhooks = state.webhooks.list()?;
    Ok(Json(serde_json::json!({ "count": webhooks.len(), "webhooks": webhooks })))
}

pub async fn remove<C: Clock>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> HttpResult<Json<serde_json::Value>> {
    if !state.webhooks.remove(&id)? {
        return Err(
            ApiError::new(ErrorKind::ServiceNotFound, format!("no webhook {:?}", id)).into()
        );
    }
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn test_fire<C: Clock>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> HttpResult<Json<serde_json::Value>> {
    let status = state.webhooks.test_fire(&id).await?;
    Ok(Json(serde_json::json!({
        "success": status.map(|s| (200..300).contains(&s)).unwrap_or(false),
        "status": status,
    })))
}

#[derive(Debug, Deserialize)]
pub struct DeliveriesQuery {
    limit: Option<u32>,
}

pub async fn deliveries<C: Clock>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
    Query(query): Query<DeliveriesQuery>,
) -> HttpResult<Json<serde_json::Value>> {
    let deliveries = state.webhooks.deliveries(&id, query.limit.unwrap_or(50).min(500))?;
    Ok(Json(serde_json::json!({ "count": deliveries.len(), "deliveries": deliveries })))
}
