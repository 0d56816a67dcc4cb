// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health-wait specs against a real loopback listener.

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::prelude::*;

/// Minimal HTTP responder: answers every request with 200.
async fn spawn_health_listener() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else { return };
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let _ = stream
                    .write_all(
                        b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok",
                    )
                    .await;
            });
        }
    });
    port
}

#[tokio::test]
async fn wait_times_out_then_succeeds_once_listening() {
    let mut config = pd_core::Config::default();
    // Keep the polling quick so the timeout spec stays fast.
    config.health.poll_interval_ms = 20;
    // The health listener binds an ephemeral port; let claims target it.
    config.ports.range_start = 1024;
    config.ports.range_end = 65_535;
    let app = app_with(config);

    // Claim a concrete port with nothing listening on it.
    let port = spawn_health_listener().await;
    let dead_port = port.wrapping_add(1).max(1024);
    let (status, body) = app
        .post("/claim", json!({"id": "acme:api", "port": dead_port, "pid": std::process::id()}))
        .await;
    assert_eq!(status, 200, "{}", body);

    let (status, body) = app.get("/wait/acme:api?timeout=200").await;
    assert_eq!(status, 408);
    assert_code(&body, "TIMEOUT");

    // Re-point the lease at the live listener and wait again.
    app.request("DELETE", "/release", Some(json!({"id": "acme:api"}))).await;
    let (status, _) = app
        .post("/claim", json!({"id": "acme:api", "port": port, "pid": std::process::id()}))
        .await;
    assert_eq!(status, 200);

    let (status, body) = app.get("/wait/acme:api?timeout=5000").await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["service"]["healthy"], true);
    assert!(body["service"]["latencyMs"].as_u64().unwrap() <= 5_000);
}

#[tokio::test]
async fn wait_unknown_service_404() {
    let app = app();
    let (status, body) = app.get("/wait/ghost:api?timeout=100").await;
    assert_eq!(status, 404);
    assert_code(&body, "SERVICE_NOT_FOUND");
}

#[tokio::test]
async fn wait_all_partial_results() {
    let mut config = pd_core::Config::default();
    config.health.poll_interval_ms = 20;
    config.ports.range_start = 1024;
    config.ports.range_end = 65_535;
    let app = app_with(config);

    let live_port = spawn_health_listener().await;
    app.post("/claim", json!({"id": "up:x", "port": live_port, "pid": std::process::id()}))
        .await;
    let (_, body) = app.post("/claim", json!({"id": "down:x", "pid": std::process::id()})).await;
    assert_eq!(body["success"], true);

    let (status, body) = app
        .post("/wait", json!({"ids": ["up:x", "down:x"], "timeout": 300}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["requested"], 2);
    assert_eq!(body["resolved"], 1);
    assert_eq!(body["timedOut"], true);
}

#[tokio::test]
async fn wait_all_caps_ids() {
    let app = app();
    let ids: Vec<String> = (0..21).map(|n| format!("s{}:x", n)).collect();
    let (status, body) = app.post("/wait", json!({"ids": ids, "timeout": 10})).await;
    assert_eq!(status, 400);
    assert_code(&body, "VALIDATION_ERROR");
}
