// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon self-reporting and transport-policy specs.

use serde_json::json;

use crate::prelude::*;

#[tokio::test]
async fn health_reports_active_ports() {
    let app = app();
    app.post("/claim", json!({"id": "a:x", "pid": std::process::id()})).await;

    let (status, body) = app.get("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["active_ports"], 1);
    assert_eq!(body["pid"].as_u64().unwrap(), u64::from(std::process::id()));
}

#[tokio::test]
async fn version_shape() {
    let app = app();
    let (status, body) = app.get("/version").await;
    assert_eq!(status, 200);
    assert!(body["version"].is_string());
    assert!(body["startedAt"].is_u64());
    assert!(body["pid"].is_u64());
}

#[tokio::test]
async fn metrics_counters_move() {
    let app = app();
    app.post("/claim", json!({"id": "a:x", "pid": std::process::id()})).await;
    app.post("/msg/c", json!({"payload": 1})).await;

    let (status, body) = app.get("/metrics").await;
    assert_eq!(status, 200);
    assert!(body["requests_total"].as_u64().unwrap() >= 2);
    assert_eq!(body["claims_total"], 1);
    assert_eq!(body["messages_published_total"], 1);
    assert_eq!(body["active_leases"], 1);
    assert_eq!(body["stored_messages"], 1);
}

#[tokio::test]
async fn per_peer_rate_limit() {
    let mut config = pd_core::Config::default();
    config.rate_limit.per_ip_per_minute = 3;
    let app = app_with(config);

    for _ in 0..3 {
        let (status, _) = app.get("/health").await;
        assert_eq!(status, 200);
    }
    let (status, body) = app.get("/health").await;
    assert_eq!(status, 429);
    assert_code(&body, "RATE_LIMITED");
}

#[tokio::test]
async fn non_json_content_type_is_rejected() {
    let app = app();
    let (status, body) = app
        .request_with_headers(
            "POST",
            "/locks/migrate",
            Some(json!({"owner": "A"})),
            &[("content-type", "text/plain")],
        )
        .await;
    assert_eq!(status, 400);
    assert_code(&body, "VALIDATION_ERROR");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = app();
    let (status, _) = app.get("/nope").await;
    assert_eq!(status, 404);
}
