// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Semantic port lease specs.

use serde_json::json;

use crate::prelude::*;

#[tokio::test]
async fn semantic_reuse_end_to_end() {
    let app = app();

    // First claim allocates.
    let (status, body) = app
        .request_with_headers(
            "POST",
            "/claim",
            Some(json!({"id": "acme:api:main"})),
            &[("x-pid", "1")],
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["existing"], false);
    let port = body["port"].as_u64().unwrap();
    assert!((3100..=9999).contains(&port));

    // Same identity from another live pid: same port, existing = true.
    let (status, body) = app
        .request_with_headers(
            "POST",
            "/claim",
            Some(json!({"id": "acme:api:main"})),
            &[("x-pid", "1")],
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["existing"], true);
    assert_eq!(body["port"].as_u64().unwrap(), port);

    // The listing has exactly one row.
    let (status, body) = app.get("/services/acme:api:main").await;
    assert_eq!(status, 200);
    assert_eq!(body["service"]["port"].as_u64().unwrap(), port);

    // Glob release.
    let (status, body) =
        app.request("DELETE", "/release", Some(json!({"id": "acme:*"}))).await;
    assert_eq!(status, 200);
    assert_eq!(body["released"], 1);
    assert_eq!(body["releasedPorts"][0].as_u64().unwrap(), port);

    // Releasing again is a no-op.
    let (status, body) =
        app.request("DELETE", "/release", Some(json!({"id": "acme:*"}))).await;
    assert_eq!(status, 200);
    assert_eq!(body["released"], 0);
}

#[tokio::test]
async fn preferred_port_boundaries() {
    let mut config = pd_core::Config::default();
    config.ports.range_start = 3100;
    config.ports.range_end = 3110;
    config.ports.reserved = vec![3105];
    let app = app_with(config);

    let (status, body) =
        app.post("/claim", json!({"id": "a:x", "port": 3099})).await;
    assert_eq!(status, 400);
    assert_code(&body, "PORT_OUT_OF_RANGE");

    let (status, body) =
        app.post("/claim", json!({"id": "a:x", "port": 3105})).await;
    assert_eq!(status, 400);
    assert_code(&body, "PORT_RESERVED");

    let (status, body) =
        app.post("/claim", json!({"id": "a:x", "port": 3107})).await;
    assert_eq!(status, 200);
    assert_eq!(body["port"], 3107);
}

#[tokio::test]
async fn exhausted_range_is_429() {
    let mut config = pd_core::Config::default();
    config.ports.range_start = 3100;
    config.ports.range_end = 3101;
    let app = app_with(config);

    app.post("/claim", json!({"id": "a:x", "pid": 1})).await;
    app.post("/claim", json!({"id": "b:x", "pid": 1})).await;
    let (status, body) = app.post("/claim", json!({"id": "c:x", "pid": 1})).await;
    assert_eq!(status, 429);
    assert_code(&body, "PORT_EXHAUSTED");
}

#[tokio::test]
async fn invalid_identity_and_pid_and_metadata() {
    let app = app();

    let (status, body) = app.post("/claim", json!({"id": "a::b"})).await;
    assert_eq!(status, 400);
    assert_code(&body, "IDENTITY_INVALID");

    let (status, body) =
        app.request_with_headers("POST", "/claim", Some(json!({"id": "a:x"})), &[("x-pid", "-4")])
            .await;
    assert_eq!(status, 400);
    assert_code(&body, "PID_INVALID");

    let big = "x".repeat(4097);
    let (status, body) =
        app.post("/claim", json!({"id": "a:x", "metadata": {"blob": big}})).await;
    assert_eq!(status, 400);
    assert_code(&body, "METADATA_TOO_LARGE");
}

#[tokio::test]
async fn release_requires_id_or_expired() {
    let app = app();
    let (status, body) = app.request("DELETE", "/release", Some(json!({}))).await;
    assert_eq!(status, 400);
    assert_code(&body, "VALIDATION_ERROR");
}

#[tokio::test]
async fn expired_release_path() {
    let app = app();
    app.post("/claim", json!({"id": "a:x", "expires": 1000, "pid": 1})).await;
    app.post("/claim", json!({"id": "b:x", "pid": 1})).await;

    app.clock.advance(std::time::Duration::from_millis(2_000));
    let (status, body) =
        app.request("DELETE", "/release", Some(json!({"expired": true}))).await;
    assert_eq!(status, 200);
    assert_eq!(body["released"], 1);

    let (_, body) = app.get("/services").await;
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn endpoints_and_listing_filters() {
    let app = app();
    let (_, claimed) = app.post("/claim", json!({"id": "acme:api", "pid": 1})).await;
    let port = claimed["port"].as_u64().unwrap();

    let (status, _) = app
        .request(
            "PUT",
            "/services/acme:api/endpoints/dev",
            Some(json!({"url": "http://localhost:3100"})),
        )
        .await;
    assert_eq!(status, 200);

    let (_, body) = app.get("/services/acme:api").await;
    assert_eq!(body["service"]["endpoints"]["dev"], "http://localhost:3100");

    let (_, body) = app.get(&format!("/services?port={}", port)).await;
    assert_eq!(body["count"], 1);

    let (_, body) = app.get("/services?pattern=acme:*").await;
    assert_eq!(body["count"], 1);

    let (_, body) = app.get("/services?pattern=other").await;
    assert_eq!(body["count"], 0);

    let (status, body) = app.get("/services/ghost:api").await;
    assert_eq!(status, 404);
    assert_code(&body, "SERVICE_NOT_FOUND");
}

#[tokio::test]
async fn active_ports_report_liveness() {
    let app = app();
    let me = std::process::id();
    app.post("/claim", json!({"id": "live:x", "pid": me})).await;
    app.post("/claim", json!({"id": "dead:x", "pid": i32::MAX as u32 - 1})).await;

    let (status, body) = app.get("/ports/active").await;
    assert_eq!(status, 200);
    let ports = body["ports"].as_array().unwrap();
    let live = ports.iter().find(|p| p["id"] == "live:x").unwrap();
    let dead = ports.iter().find(|p| p["id"] == "dead:x").unwrap();
    assert_eq!(live["alive"], true);
    assert_eq!(dead["alive"], false);
}

#[tokio::test]
async fn cleanup_frees_dead_and_expired() {
    let app = app();
    app.post("/claim", json!({"id": "dead:x", "pid": i32::MAX as u32 - 1})).await;
    app.post("/claim", json!({"id": "old:x", "pid": std::process::id(), "expires": 500})).await;
    app.post("/claim", json!({"id": "keep:x", "pid": std::process::id()})).await;

    app.clock.advance(std::time::Duration::from_millis(1_000));
    let (status, body) = app.post("/ports/cleanup", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["count"], 2);

    let (_, body) = app.get("/services").await;
    assert_eq!(body["count"], 1);
}
