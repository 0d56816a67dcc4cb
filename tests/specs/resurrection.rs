// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resurrection flow: stale detection, promotion, claim, complete.

use std::sync::Arc;

use serde_json::json;

use pd_daemon::sweeper::Sweeper;

use crate::prelude::*;

fn sweeper(app: &TestApp) -> Sweeper<pd_core::FakeClock> {
    Sweeper::new(
        Arc::clone(&app.state.store),
        Arc::clone(&app.state.config),
        Arc::clone(&app.state.resurrection),
        Arc::clone(&app.state.activity),
        Arc::clone(&app.state.webhooks),
        Arc::clone(&app.state.metrics),
        app.clock.clone(),
    )
}

#[tokio::test]
async fn resurrection_end_to_end() {
    let app = app();
    let sweeper = sweeper(&app);

    // Agent X registers and starts a session.
    app.post("/agents", json!({"id": "agent-x", "identity": "acme:api"})).await;
    let (_, body) = app
        .post("/sessions", json!({"purpose": "deploy", "agentId": "agent-x"}))
        .await;
    let session = body["id"].as_str().unwrap().to_string();

    // Six minutes of silence: the sweeper queues X as stale.
    app.clock.advance(std::time::Duration::from_secs(6 * 60));
    sweeper.sweep_once();

    let (_, body) = app.get("/resurrection/pending?project=acme").await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["entries"][0]["agentId"], "agent-x");
    assert_eq!(body["entries"][0]["status"], "stale");
    assert_eq!(body["entries"][0]["purpose"], "deploy");

    // At sixteen minutes it is promoted to dead.
    app.clock.advance(std::time::Duration::from_secs(10 * 60));
    sweeper.sweep_once();
    let (_, body) = app.get("/resurrection?status=dead").await;
    assert_eq!(body["count"], 1);

    // Claim, then complete onto a new agent.
    let (status, body) = app
        .post("/resurrection/claim/agent-x", json!({"claimedBy": "agent-y"}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["entry"]["status"], "resurrecting");

    let (status, body) = app
        .post("/resurrection/complete/agent-x", json!({"newAgentId": "agent-y"}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["reparentedSessions"], 1);

    // The session now belongs to agent-y and the queue is empty.
    let (_, body) = app.get(&format!("/sessions/{}", session)).await;
    assert_eq!(body["session"]["agentId"], "agent-y");
    let (_, body) = app.get("/resurrection").await;
    assert_eq!(body["count"], 0);

    // Every transition was announced on the resurrection channel.
    let (_, body) = app.get("/msg/resurrection?after=0&limit=100").await;
    let transitions: Vec<&str> = body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["payload"]["transition"].as_str().unwrap())
        .collect();
    assert_eq!(transitions, vec!["stale", "dead", "claimed", "completed"]);
}

#[tokio::test]
async fn abandon_and_dismiss() {
    let app = app();
    let sweeper = sweeper(&app);
    app.post("/agents", json!({"id": "agent-x"})).await;
    app.clock.advance(std::time::Duration::from_secs(6 * 60));
    sweeper.sweep_once();

    app.post("/resurrection/claim/agent-x", json!({})).await;
    let (status, _) = app.post("/resurrection/abandon/agent-x", json!({})).await;
    assert_eq!(status, 200);
    let (_, body) = app.get("/resurrection").await;
    assert_eq!(body["entries"][0]["status"], "stale");

    let (status, _) = app.request("DELETE", "/resurrection/agent-x", None).await;
    assert_eq!(status, 200);
    let (_, body) = app.get("/resurrection").await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn stale_agent_locks_are_released() {
    let app = app();
    let sweeper = sweeper(&app);
    app.post("/agents", json!({"id": "agent-x"})).await;
    app.post("/locks/deploy", json!({"owner": "agent-x", "ttl": 3_600_000})).await;

    app.clock.advance(std::time::Duration::from_secs(6 * 60));
    sweeper.sweep_once();

    let (_, body) = app.get("/locks/deploy").await;
    assert_eq!(body["held"], false);
}

#[tokio::test]
async fn heartbeat_keeps_agent_out_of_queue() {
    let app = app();
    let sweeper = sweeper(&app);
    app.post("/agents", json!({"id": "agent-x"})).await;

    app.clock.advance(std::time::Duration::from_secs(4 * 60));
    app.post("/agents/agent-x/heartbeat", json!({})).await;
    app.clock.advance(std::time::Duration::from_secs(4 * 60));
    sweeper.sweep_once();

    let (_, body) = app.get("/resurrection").await;
    assert_eq!(body["count"], 0);
}
