// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use pd_core::{ErrorKind, FakeClock};
use pd_storage::sessions::SessionFilter;
use pd_storage::Store;

use super::*;

fn registry() -> (SessionRegistry<FakeClock>, FakeClock) {
    let clock = FakeClock::new();
    clock.set_epoch_ms(1_000);
    let registry = SessionRegistry::new(Arc::new(Store::open_in_memory().unwrap()), clock.clone());
    (registry, clock)
}

fn files(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn start(registry: &SessionRegistry<FakeClock>, purpose: &str, claim: &[&str]) -> StartOutcome {
    registry
        .start(&StartArgs {
            purpose: purpose.to_string(),
            files: files(claim),
            ..Default::default()
        })
        .unwrap()
}

#[test]
fn start_claims_files() {
    let (registry, _clock) = registry();
    let outcome = start(&registry, "deploy", &["a.ts", "b.ts"]);
    assert!(outcome.id.starts_with("session-"));
    assert_eq!(outcome.claimed.len(), 2);

    let info = registry.get(&outcome.id).unwrap().unwrap();
    assert_eq!(info.status, "active");
    assert_eq!(info.files, files(&["a.ts", "b.ts"]));
}

#[test]
fn start_rejects_empty_purpose() {
    let (registry, _clock) = registry();
    let err = registry.start(&StartArgs { purpose: "  ".to_string(), ..Default::default() });
    assert_eq!(err.unwrap_err().kind, ErrorKind::ValidationError);
}

#[test]
fn conflicting_start_returns_409_detail() {
    let (registry, _clock) = registry();
    let first = start(&registry, "one", &["a.ts", "b.ts"]);

    let err = registry
        .start(&StartArgs {
            purpose: "two".to_string(),
            files: files(&["b.ts"]),
            ..Default::default()
        })
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::FileConflict);
    let detail = err.detail.unwrap();
    assert_eq!(detail["conflicts"][0]["path"], "b.ts");
    assert_eq!(detail["conflicts"][0]["sessionId"], first.id.as_str());
}

#[test]
fn force_start_displaces_previous_claim() {
    let (registry, _clock) = registry();
    let first = start(&registry, "one", &["b.ts"]);

    let outcome = registry
        .start(&StartArgs {
            purpose: "two".to_string(),
            files: files(&["b.ts"]),
            force: true,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(outcome.displaced.len(), 1);
    assert_eq!(outcome.displaced[0].session_id, first.id);

    // The displaced session no longer holds the file.
    let info = registry.get(&first.id).unwrap().unwrap();
    assert!(info.files.is_empty());
    // And the new session does.
    let info = registry.get(&outcome.id).unwrap().unwrap();
    assert_eq!(info.files, files(&["b.ts"]));
}

#[test]
fn end_releases_files_and_stamps() {
    let (registry, clock) = registry();
    let session = start(&registry, "deploy", &["a.ts"]);
    clock.advance(std::time::Duration::from_millis(500));

    let outcome = registry.end(&session.id, None, Some("done, handing off")).unwrap();
    assert_eq!(outcome.status, "completed");
    assert_eq!(outcome.released_files, files(&["a.ts"]));

    let info = registry.get(&session.id).unwrap().unwrap();
    assert_eq!(info.status, "completed");
    assert_eq!(info.completed_at, Some(1_500));

    let notes = registry.notes(&session.id, 10).unwrap();
    assert_eq!(notes[0].kind, "handoff");
}

#[test]
fn end_twice_is_benign() {
    let (registry, _clock) = registry();
    let session = start(&registry, "deploy", &[]);
    registry.end(&session.id, Some("abandoned"), None).unwrap();

    let again = registry.end(&session.id, Some("completed"), None).unwrap();
    assert_eq!(again.status, "abandoned");
    assert!(again.released_files.is_empty());
}

#[test]
fn end_unknown_session_404() {
    let (registry, _clock) = registry();
    let err = registry.end("session-none", None, None).unwrap_err();
    assert_eq!(err.kind, ErrorKind::SessionNotFound);
}

#[test]
fn end_rejects_bogus_status() {
    let (registry, _clock) = registry();
    let session = start(&registry, "deploy", &[]);
    let err = registry.end(&session.id, Some("paused"), None).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ValidationError);
}

#[test]
fn claim_files_on_live_session() {
    let (registry, _clock) = registry();
    let session = start(&registry, "deploy", &["a.ts"]);

    let outcome = registry.claim_files(&session.id, &files(&["b.ts", "a.ts"]), false).unwrap();
    // a.ts was already held: only b.ts is a fresh claim.
    assert_eq!(outcome.claimed, files(&["b.ts"]));

    let info = registry.get(&session.id).unwrap().unwrap();
    assert_eq!(info.files, files(&["a.ts", "b.ts"]));
}

#[test]
fn claim_files_conflict_without_force() {
    let (registry, _clock) = registry();
    let first = start(&registry, "one", &["x.ts"]);
    let second = start(&registry, "two", &[]);

    let err = registry.claim_files(&second.id, &files(&["x.ts"]), false).unwrap_err();
    assert_eq!(err.kind, ErrorKind::FileConflict);

    let outcome = registry.claim_files(&second.id, &files(&["x.ts"]), true).unwrap();
    assert_eq!(outcome.displaced[0].session_id, first.id);
}

#[test]
fn claim_files_requires_active_session() {
    let (registry, _clock) = registry();
    let session = start(&registry, "deploy", &[]);
    registry.end(&session.id, None, None).unwrap();
    let err = registry.claim_files(&session.id, &files(&["a.ts"]), false).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ValidationError);
}

#[test]
fn release_files_returns_released_only() {
    let (registry, _clock) = registry();
    let session = start(&registry, "deploy", &["a.ts"]);
    let released = registry.release_files(&session.id, &files(&["a.ts", "zz.ts"])).unwrap();
    assert_eq!(released, files(&["a.ts"]));
}

#[test]
fn quick_note_reuses_most_recent_active_session() {
    let (registry, clock) = registry();
    let session = registry
        .start(&StartArgs {
            purpose: "deploy".to_string(),
            agent_id: Some("agent-1".to_string()),
            ..Default::default()
        })
        .unwrap();
    clock.advance(std::time::Duration::from_millis(10));

    let outcome = registry.quick_note("progress update", Some("agent-1"), None).unwrap();
    assert_eq!(outcome.session_id, session.id);
    assert!(!outcome.session_created);
}

#[test]
fn quick_note_creates_session_when_none_active() {
    let (registry, _clock) = registry();
    let outcome = registry.quick_note("note from nowhere", Some("agent-2"), None).unwrap();
    assert!(outcome.session_created);
    let info = registry.get(&outcome.session_id).unwrap().unwrap();
    assert_eq!(info.purpose, "Quick note");
    assert_eq!(info.agent_id.as_deref(), Some("agent-2"));
}

#[test]
fn notes_on_missing_session_404() {
    let (registry, _clock) = registry();
    let err = registry.add_note("session-none", "hello", None).unwrap_err();
    assert_eq!(err.kind, ErrorKind::SessionNotFound);
    let err = registry.notes("session-none", 5).unwrap_err();
    assert_eq!(err.kind, ErrorKind::SessionNotFound);
}

#[test]
fn remove_hard_deletes() {
    let (registry, _clock) = registry();
    let session = start(&registry, "deploy", &["a.ts"]);
    assert!(registry.remove(&session.id).unwrap());
    assert!(registry.get(&session.id).unwrap().is_none());
    // The path is claimable again.
    start(&registry, "fresh", &["a.ts"]);
}

#[test]
fn list_filters_by_status() {
    let (registry, _clock) = registry();
    let keep = start(&registry, "one", &[]);
    let done = start(&registry, "two", &[]);
    registry.end(&done.id, None, None).unwrap();

    let filter = SessionFilter { status: Some("active".to_string()), ..Default::default() };
    let active = registry.list(&filter).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, keep.id);
}

#[test]
fn worktree_id_is_stable_hex() {
    let a = worktree_id("/work/acme");
    let b = worktree_id("/work/acme");
    let other = worktree_id("/work/beta");
    assert_eq!(a, b);
    assert_ne!(a, other);
    assert_eq!(a.len(), 16);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn session_with_cwd_gets_worktree_id() {
    let (registry, _clock) = registry();
    let outcome = registry
        .start(&StartArgs {
            purpose: "deploy".to_string(),
            cwd: Some("/work/acme".to_string()),
            ..Default::default()
        })
        .unwrap();
    let info = registry.get(&outcome.id).unwrap().unwrap();
    assert_eq!(info.worktree_id.as_deref(), Some(worktree_id("/work/acme").as_str()));
}
