// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook registration specs. Delivery mechanics are covered by the
//! daemon's unit tests; here we exercise the wire surface and filters.

use serde_json::json;

use crate::prelude::*;

#[tokio::test]
async fn register_list_delete() {
    let app = app();
    let (status, body) = app
        .post(
            "/webhooks",
            json!({
                "url": "https://hooks.example.com/deploy",
                "events": ["service.claim", "service.release"],
                "secret": "s3cret",
                "filterPattern": "acme:*",
            }),
        )
        .await;
    assert_eq!(status, 200);
    let id = body["id"].as_str().unwrap().to_string();

    let (_, body) = app.get("/webhooks").await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["webhooks"][0]["url"], "https://hooks.example.com/deploy");
    assert_eq!(body["webhooks"][0]["active"], true);

    let (status, _) = app.request("DELETE", &format!("/webhooks/{}", id), None).await;
    assert_eq!(status, 200);
    let (status, body) = app.request("DELETE", &format!("/webhooks/{}", id), None).await;
    assert_eq!(status, 404);
    assert_code(&body, "SERVICE_NOT_FOUND");
}

#[tokio::test]
async fn ssrf_targets_are_rejected() {
    let app = app();
    for url in [
        "http://localhost:9999/x",
        "http://127.0.0.1/x",
        "http://169.254.169.254/latest/meta-data",
        "http://10.0.0.8/x",
        "http://vault.internal/x",
    ] {
        let (status, body) = app
            .post("/webhooks", json!({"url": url, "events": ["service.claim"]}))
            .await;
        assert_eq!(status, 400, "{} must be rejected", url);
        assert_code(&body, "SSRF_BLOCKED");
    }
}

#[tokio::test]
async fn unknown_event_is_rejected() {
    let app = app();
    let (status, body) = app
        .post(
            "/webhooks",
            json!({"url": "https://hooks.example.com/x", "events": ["service.explode"]}),
        )
        .await;
    assert_eq!(status, 400);
    assert_code(&body, "VALIDATION_ERROR");
}

#[tokio::test]
async fn claim_produces_a_delivery_record() {
    let app = app();
    let (_, body) = app
        .post(
            "/webhooks",
            json!({"url": "https://hooks.example.com/x", "events": ["service.claim"]}),
        )
        .await;
    let id = body["id"].as_str().unwrap().to_string();

    app.post("/claim", json!({"id": "acme:api", "pid": std::process::id()})).await;

    let (status, body) = app.get(&format!("/webhooks/{}/deliveries", id)).await;
    assert_eq!(status, 200);
    assert_eq!(body["count"], 1);
    assert_eq!(body["deliveries"][0]["event"], "service.claim");
}
