// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock fencing specs.

use serde_json::json;

use crate::prelude::*;

#[tokio::test]
async fn lock_fencing_end_to_end() {
    let app = app();

    // A acquires.
    let (status, body) =
        app.post("/locks/migrate", json!({"owner": "A", "ttl": 60000})).await;
    assert_eq!(status, 200);
    assert_eq!(body["owner"], "A");
    let first_expiry = body["expiresAt"].as_u64().unwrap();

    // B is fenced out with holder detail.
    let (status, body) =
        app.post("/locks/migrate", json!({"owner": "B", "ttl": 60000})).await;
    assert_eq!(status, 409);
    assert_code(&body, "LOCK_HELD");
    assert_eq!(body["detail"]["holder"], "A");

    // A extends; expiry advances.
    app.clock.advance(std::time::Duration::from_millis(5_000));
    let (status, body) = app
        .request("PUT", "/locks/migrate", Some(json!({"owner": "A", "ttl": 60000})))
        .await;
    assert_eq!(status, 200);
    assert!(body["expiresAt"].as_u64().unwrap() > first_expiry);

    // B cannot release without force.
    let (status, body) =
        app.request("DELETE", "/locks/migrate", Some(json!({"owner": "B"}))).await;
    assert_eq!(status, 403);
    assert_code(&body, "LOCK_FORBIDDEN");

    // Force wins.
    let (status, body) = app
        .request("DELETE", "/locks/migrate", Some(json!({"owner": "B", "force": true})))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["released"], true);

    let (status, body) = app.get("/locks/migrate").await;
    assert_eq!(status, 200);
    assert_eq!(body["held"], false);
}

#[tokio::test]
async fn reacquire_by_holder_is_idempotent() {
    let app = app();
    app.post("/locks/deploy", json!({"owner": "A", "ttl": 10000})).await;
    app.clock.advance(std::time::Duration::from_millis(5_000));

    let (status, body) =
        app.post("/locks/deploy", json!({"owner": "A", "ttl": 10000})).await;
    assert_eq!(status, 200);
    // acquiredAt is preserved, expiry refreshed from the later now.
    assert_eq!(body["acquiredAt"].as_u64().unwrap(), 1_000_000);
    assert_eq!(body["expiresAt"].as_u64().unwrap(), 1_015_000);
}

#[tokio::test]
async fn expired_lock_is_not_held() {
    let app = app();
    app.post("/locks/tmp", json!({"owner": "A", "ttl": 1000})).await;
    app.clock.advance(std::time::Duration::from_millis(1_500));

    let (_, body) = app.get("/locks/tmp").await;
    assert_eq!(body["held"], false);

    // And B can take it.
    let (status, body) = app.post("/locks/tmp", json!({"owner": "B"})).await;
    assert_eq!(status, 200);
    assert_eq!(body["owner"], "B");
}

#[tokio::test]
async fn list_locks_by_owner() {
    let app = app();
    app.post("/locks/a", json!({"owner": "A"})).await;
    app.post("/locks/b", json!({"owner": "B"})).await;

    let (_, body) = app.get("/locks").await;
    assert_eq!(body["count"], 2);
    let (_, body) = app.get("/locks?owner=A").await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["locks"][0]["name"], "a");
}

#[tokio::test]
async fn lock_quota_for_registered_agent() {
    let app = app();
    app.post("/agents", json!({"id": "agent-1", "maxLocks": 1})).await;
    app.post("/locks/one", json!({"owner": "agent-1"})).await;

    let (status, body) = app.post("/locks/two", json!({"owner": "agent-1"})).await;
    assert_eq!(status, 429);
    assert_code(&body, "QUOTA_EXCEEDED");
    assert_eq!(body["detail"]["current"], 1);
}
