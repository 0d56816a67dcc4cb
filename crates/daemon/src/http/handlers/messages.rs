// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pub/sub endpoints: publish, read, long-poll, SSE subscribe.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Extension, Path, Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tokio_stream::StreamExt;

use pd_core::{ActivityKind, Clock, WebhookEvent};
use pd_wire::PublishRequest;

use crate::http::extract::json_body;
use crate::http::sse::SubscriberStream;
use crate::http::{AppState, HttpResult, PeerKey};
use crate::metrics::Metrics;

pub async fn publish<C: Clock>(
    State(state): State<AppState<C>>,
    Path(channel): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResult<Json<serde_json::Value>> {
    let request: PublishRequest = json_body(&headers, &body)?;
    let outcome = state.messaging.publish(
        &channel,
        &request.payload,
        request.sender.as_deref(),
        request.expires,
    )?;

    Metrics::bump(&state.metrics.messages_published_total);
    state.activity.log(
        ActivityKind::MessagePublish,
        request.sender.as_deref(),
        Some(&channel),
        &format!("message {}", outcome.id),
        None,
    );
    state.webhooks.trigger(
        WebhookEvent::MessagePublish,
        serde_json::json!({"channel": channel, "id": outcome.id}),
        Some(&channel),
    );

    Ok(Json(serde_json::json!({ "success": true, "id": outcome.id })))
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    after: Option<i64>,
    limit: Option<u32>,
}

pub async fn get_messages<C: Clock>(
    State(state): State<AppState<C>>,
    Path(channel): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> HttpResult<Json<serde_json::Value>> {
    let messages = state.messaging.get(&channel, query.after, query.limit)?;
    Ok(Json(serde_json::json!({ "count": messages.len(), "messages": messages })))
}

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    #[serde(default)]
    after: i64,
    timeout: Option<u64>,
}

pub async fn poll<C: Clock>(
    State(state): State<AppState<C>>,
    Path(channel): Path<String>,
    Query(query): Query<PollQuery>,
    peer: Option<Extension<PeerKey>>,
) -> HttpResult<Json<serde_json::Value>> {
    let peer = peer.map(|Extension(p)| p).unwrap_or_else(PeerKey::unix);
    let _slot = state.budgets.acquire_longpoll(&peer.0)?;

    // Gauge guard so a client disconnect mid-wait still decrements.
    struct Gauge(std::sync::Arc<Metrics>);
    impl Drop for Gauge {
        fn drop(&mut self) {
            Metrics::decr(&self.0.longpoll_active);
        }
    }
    Metrics::bump(&state.metrics.longpoll_active);
    let _gauge = Gauge(state.metrics.clone());

    let timeout = query.timeout.unwrap_or(30_000);
    let message = state.messaging.poll(&channel, query.after, timeout).await?;
    Ok(Json(serde_json::json!({ "message": message })))
}

pub async fn subscribe<C: Clock>(
    State(state): State<AppState<C>>,
    Path(channel): Path<String>,
    peer: Option<Extension<PeerKey>>,
) -> HttpResult<impl IntoResponse> {
    let peer = peer.map(|Extension(p)| p).unwrap_or_else(PeerKey::unix);
    let slot = state.budgets.acquire_sse(&peer.0)?;
    let subscription = state.messaging.subscribe(&channel)?;

    // Absolute connection cap: a deadline task detaches the subscriber,
    // which ends the stream.
    let deadline = Duration::from_millis(state.config.messaging.sse_timeout_ms);
    let sub_id = subscription.id;
    let kick_state = state.clone();
    let kick_channel = channel.clone();
    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown.cancelled() => {}
            _ = tokio::time::sleep(deadline) => {}
        }
        kick_state.messaging.kick(&kick_channel, sub_id);
    });

    let connected = tokio_stream::once(Ok(axum::response::sse::Event::default()
        .event("connected")
        .data("{}")));
    let stream =
        connected.chain(SubscriberStream::new(subscription, slot, state.metrics.clone()));

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new().interval(Duration::from_secs(30)).text("heartbeat"),
    ))
}
