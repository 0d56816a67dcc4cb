// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered pub/sub specs: SSE fan-out, reads, long-poll, budgets.

use axum::body::Body;
use axum::http::Request;
use http_body_util::BodyExt;
use serde_json::json;
use tower::util::ServiceExt;

use crate::prelude::*;

async fn open_sse(
    app: &TestApp,
    channel: &str,
) -> axum::http::Response<axum::body::Body> {
    let request = Request::builder()
        .method("GET")
        .uri(format!("/msg/{}/subscribe", channel))
        .body(Body::empty())
        .unwrap();
    app.router.clone().oneshot(request).await.unwrap()
}

/// Read SSE frames until `needle` has appeared `count` times, collecting
/// everything seen.
async fn read_until(body: &mut axum::body::Body, needle: &str, count: usize) -> String {
    let mut seen = String::new();
    while seen.matches(needle).count() < count {
        let frame = tokio::time::timeout(std::time::Duration::from_secs(5), body.frame())
            .await
            .expect("timed out waiting for SSE frame")
            .expect("SSE stream ended early")
            .expect("SSE stream errored");
        if let Some(data) = frame.data_ref() {
            seen.push_str(&String::from_utf8_lossy(data));
        }
    }
    seen
}

#[tokio::test]
async fn ordered_fan_out_to_two_subscribers() {
    let app = app();

    let first = open_sse(&app, "build:done").await;
    assert_eq!(first.status(), 200);
    assert_eq!(
        first.headers().get("content-type").unwrap().to_str().unwrap(),
        "text/event-stream"
    );
    let second = open_sse(&app, "build:done").await;

    let mut first_body = first.into_body();
    let mut second_body = second.into_body();

    // Both streams begin with the connected frame.
    let opening = read_until(&mut first_body, "connected", 1).await;
    assert!(opening.contains("event: connected"));
    read_until(&mut second_body, "connected", 1).await;

    let (status, body) =
        app.post("/msg/build:done", json!({"payload": {"n": 1}})).await;
    assert_eq!(status, 200);
    let first_id = body["id"].as_i64().unwrap();
    app.post("/msg/build:done", json!({"payload": {"n": 2}})).await;

    for body in [&mut first_body, &mut second_body] {
        let seen = read_until(body, "\"n\":", 2).await;
        let n1 = seen.find("\"n\":1").expect("n=1 frame");
        let n2 = seen.find("\"n\":2").expect("n=2 frame");
        assert!(n1 < n2, "frames out of order: {}", seen);
    }

    // After disconnect, the read API resumes from `after`.
    drop(first_body);
    let (_, body) = app.get(&format!("/msg/build:done?after={}", first_id)).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["messages"][0]["payload"]["n"], 2);
}

#[tokio::test]
async fn sse_budget_per_peer_frees_on_disconnect() {
    let mut config = pd_core::Config::default();
    config.messaging.sse_concurrent_per_ip_max = 1;
    let app = app_with(config);

    let first = open_sse(&app, "c").await;
    assert_eq!(first.status(), 200);

    let second = open_sse(&app, "c").await;
    assert_eq!(second.status(), 503);

    // Disconnect frees the slot.
    drop(first);
    // The slot is released when the stream drops; poll until the router
    // accepts a new subscriber.
    let mut accepted = false;
    for _ in 0..50 {
        let retry = open_sse(&app, "c").await;
        if retry.status() == 200 {
            accepted = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(accepted, "budget slot never freed");
}

#[tokio::test]
async fn longpoll_returns_existing_and_times_out() {
    let app = app();
    app.post("/msg/c", json!({"payload": "x"})).await;

    let (status, body) = app.get("/msg/c/poll?after=0&timeout=1000").await;
    assert_eq!(status, 200);
    assert_eq!(body["message"]["payload"], "x");

    let after = body["message"]["id"].as_i64().unwrap();
    let (status, body) =
        app.get(&format!("/msg/c/poll?after={}&timeout=0", after)).await;
    assert_eq!(status, 200);
    assert!(body["message"].is_null());
}

#[tokio::test]
async fn longpoll_wakes_on_publish() {
    let app = std::sync::Arc::new(app());
    let waiter = {
        let app = std::sync::Arc::clone(&app);
        tokio::spawn(async move { app.get("/msg/wake/poll?after=0&timeout=30000").await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    app.post("/msg/wake", json!({"payload": {"go": true}})).await;

    let (status, body) =
        tokio::time::timeout(std::time::Duration::from_secs(5), waiter).await.unwrap().unwrap();
    assert_eq!(status, 200);
    assert_eq!(body["message"]["payload"]["go"], true);
}

#[tokio::test]
async fn oversized_publish_is_413() {
    let app = app();
    let big = "x".repeat(1024 * 1024);
    let (status, body) = app.post("/msg/c", json!({"payload": big})).await;
    assert_eq!(status, 413);
    assert_code(&body, "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn invalid_channel_is_400() {
    let app = app();
    let (status, body) = app.post("/msg/bad%20name", json!({"payload": 1})).await;
    assert_eq!(status, 400);
    assert_code(&body, "CHANNEL_INVALID");
}

#[tokio::test]
async fn page_size_is_capped() {
    let app = app();
    for n in 0..5 {
        app.post("/msg/c", json!({"payload": n})).await;
    }
    let (_, body) = app.get("/msg/c?after=0&limit=2").await;
    assert_eq!(body["count"], 2);
    // Oldest first within the window.
    assert_eq!(body["messages"][0]["payload"], 0);
}
