// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audit-log specs.

use serde_json::json;

use crate::prelude::*;

#[tokio::test]
async fn actions_append_audit_entries() {
    let app = app();
    app.post("/claim", json!({"id": "acme:api", "pid": std::process::id()})).await;
    app.post("/locks/migrate", json!({"owner": "A"})).await;
    app.post("/sessions", json!({"purpose": "work"})).await;

    let (status, body) = app.get("/activity?limit=10").await;
    assert_eq!(status, 200);
    let kinds: Vec<&str> = body["activity"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["type"].as_str().unwrap())
        .collect();
    // Newest first.
    assert_eq!(kinds, vec!["session_start", "lock_acquire", "service_claim"]);
}

#[tokio::test]
async fn filters_by_type_and_agent() {
    let app = app();
    app.post("/claim", json!({"id": "a:x", "agentId": "agent-1", "pid": std::process::id()}))
        .await;
    app.post("/locks/l", json!({"owner": "B"})).await;

    let (_, body) = app.get("/activity?type=service_claim").await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["activity"][0]["agentId"], "agent-1");

    let (_, body) = app.get("/activity?agentId=agent-1").await;
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn summary_counts_by_type() {
    let app = app();
    app.post("/locks/a", json!({"owner": "A"})).await;
    app.post("/locks/b", json!({"owner": "A"})).await;

    let (status, body) = app.get("/activity/summary").await;
    assert_eq!(status, 200);
    assert_eq!(body["byType"]["lock_acquire"], 2);
}
