// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session and file-claim conflict specs.

use serde_json::json;

use crate::prelude::*;

#[tokio::test]
async fn file_conflict_end_to_end() {
    let app = app();

    let (status, body) = app
        .post("/sessions", json!({"purpose": "refactor", "files": ["a.ts", "b.ts"]}))
        .await;
    assert_eq!(status, 200);
    let s1 = body["id"].as_str().unwrap().to_string();
    assert!(s1.starts_with("session-"));

    // Overlapping start without force: 409 with the conflicting pair.
    let (status, body) = app
        .post("/sessions", json!({"purpose": "hotfix", "files": ["b.ts"]}))
        .await;
    assert_eq!(status, 409);
    assert_code(&body, "FILE_CONFLICT");
    assert_eq!(body["detail"]["conflicts"][0]["path"], "b.ts");
    assert_eq!(body["detail"]["conflicts"][0]["sessionId"], s1.as_str());

    // With force the claim moves over.
    let (status, body) = app
        .post("/sessions", json!({"purpose": "hotfix", "files": ["b.ts"], "force": true}))
        .await;
    assert_eq!(status, 200);
    let s2 = body["id"].as_str().unwrap().to_string();
    assert_eq!(body["displaced"][0]["sessionId"], s1.as_str());

    // S1 no longer holds b.ts; S2 does.
    let (_, body) = app.get(&format!("/sessions/{}", s1)).await;
    let files = body["session"]["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0], "a.ts");

    let (_, body) = app.get(&format!("/sessions/{}", s2)).await;
    assert_eq!(body["session"]["files"][0], "b.ts");
}

#[tokio::test]
async fn end_session_releases_claims() {
    let app = app();
    let (_, body) = app
        .post("/sessions", json!({"purpose": "work", "files": ["x.ts"]}))
        .await;
    let id = body["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .request(
            "PUT",
            &format!("/sessions/{}", id),
            Some(json!({"status": "completed", "note": "done"})),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["releasedFiles"][0], "x.ts");

    // The path is free again.
    let (status, _) =
        app.post("/sessions", json!({"purpose": "next", "files": ["x.ts"]})).await;
    assert_eq!(status, 200);

    // The handoff note is attached.
    let (_, body) = app.get(&format!("/sessions/{}/notes", id)).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["notes"][0]["type"], "handoff");
}

#[tokio::test]
async fn claim_and_release_files_on_live_session() {
    let app = app();
    let (_, body) = app.post("/sessions", json!({"purpose": "work"})).await;
    let id = body["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(&format!("/sessions/{}/files", id), json!({"files": ["m.rs", "n.rs"]}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["claimed"].as_array().unwrap().len(), 2);

    let (status, body) = app
        .request(
            "DELETE",
            &format!("/sessions/{}/files", id),
            Some(json!({"files": ["m.rs"]})),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["released"][0], "m.rs");

    // Query-string form of release.
    let (status, body) = app
        .request("DELETE", &format!("/sessions/{}/files?paths=n.rs", id), None)
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["released"][0], "n.rs");
}

#[tokio::test]
async fn conflicts_probe_endpoint() {
    let app = app();
    let (_, body) = app
        .post("/sessions", json!({"purpose": "work", "files": ["a.ts"]}))
        .await;
    let id = body["id"].as_str().unwrap().to_string();

    let (status, body) = app.get("/sessions/conflicts?files=a.ts,b.ts").await;
    assert_eq!(status, 200);
    assert_eq!(body["count"], 1);
    assert_eq!(body["conflicts"][0]["sessionId"], id.as_str());
}

#[tokio::test]
async fn quick_note_lifecycle() {
    let app = app();

    // No active session for the agent: one is created.
    let (status, body) = app
        .post("/notes", json!({"content": "starting out", "agentId": "agent-1"}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["sessionCreated"], true);
    let session = body["sessionId"].as_str().unwrap().to_string();

    // Next quick note lands in the same session.
    let (_, body) = app
        .post("/notes", json!({"content": "more detail", "agentId": "agent-1"}))
        .await;
    assert_eq!(body["sessionCreated"], false);
    assert_eq!(body["sessionId"], session.as_str());
}

#[tokio::test]
async fn session_listing_and_delete() {
    let app = app();
    let (_, body) = app
        .post("/sessions", json!({"purpose": "work", "agentId": "agent-1"}))
        .await;
    let id = body["id"].as_str().unwrap().to_string();

    let (_, body) = app.get("/sessions?status=active&agentId=agent-1").await;
    assert_eq!(body["count"], 1);

    let (status, _) = app.request("DELETE", &format!("/sessions/{}", id), None).await;
    assert_eq!(status, 200);

    let (status, body) = app.get(&format!("/sessions/{}", id)).await;
    assert_eq!(status, 404);
    assert_code(&body, "SESSION_NOT_FOUND");
}

#[tokio::test]
async fn empty_purpose_is_rejected() {
    let app = app();
    let (status, body) = app.post("/sessions", json!({"purpose": "  "})).await;
    assert_eq!(status, 400);
    assert_code(&body, "VALIDATION_ERROR");
}
