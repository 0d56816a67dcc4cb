// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use pd_core::{Config, ErrorKind, FakeClock};
use pd_storage::Store;

use super::*;

fn registry() -> (LockRegistry<FakeClock>, FakeClock) {
    let clock = FakeClock::new();
    clock.set_epoch_ms(1_000);
    let registry = LockRegistry::new(
        Arc::new(Store::open_in_memory().unwrap()),
        Arc::new(Config::default()),
        clock.clone(),
    );
    (registry, clock)
}

fn owner(name: &str) -> Option<String> {
    Some(name.to_string())
}

#[test]
fn acquire_free_lock() {
    let (registry, _clock) = registry();
    let outcome = registry.acquire("migrate", owner("A"), Some(60_000), None, None).unwrap();
    assert_eq!(outcome.owner, "A");
    assert_eq!(outcome.acquired_at, 1_000);
    assert_eq!(outcome.expires_at, 61_000);
}

#[test]
fn second_owner_gets_409_with_holder() {
    let (registry, _clock) = registry();
    registry.acquire("migrate", owner("A"), Some(60_000), None, None).unwrap();
    let err = registry.acquire("migrate", owner("B"), Some(60_000), None, None).unwrap_err();
    assert_eq!(err.kind, ErrorKind::LockHeld);
    let detail = err.detail.unwrap();
    assert_eq!(detail["holder"], "A");
    assert_eq!(detail["since"], 1_000);
}

#[test]
fn reacquire_by_holder_refreshes_ttl() {
    let (registry, clock) = registry();
    registry.acquire("migrate", owner("A"), Some(60_000), None, None).unwrap();
    clock.advance(Duration::from_millis(10_000));

    let outcome = registry.acquire("migrate", owner("A"), Some(60_000), None, None).unwrap();
    // acquired_at preserved, expiry advanced from the new now.
    assert_eq!(outcome.acquired_at, 1_000);
    assert_eq!(outcome.expires_at, 71_000);
}

#[test]
fn expired_lock_is_free_for_anyone() {
    let (registry, clock) = registry();
    registry.acquire("migrate", owner("A"), Some(1_000), None, None).unwrap();
    clock.advance(Duration::from_millis(1_500));

    let outcome = registry.acquire("migrate", owner("B"), Some(60_000), None, None).unwrap();
    assert_eq!(outcome.owner, "B");
    assert_eq!(outcome.acquired_at, 2_500);
}

#[test]
fn release_fencing() {
    let (registry, _clock) = registry();
    registry.acquire("migrate", owner("A"), Some(60_000), None, None).unwrap();

    let err = registry.release("migrate", owner("B"), None, false).unwrap_err();
    assert_eq!(err.kind, ErrorKind::LockForbidden);

    assert!(registry.release("migrate", owner("B"), None, true).unwrap());
    // Already gone: released = false.
    assert!(!registry.release("migrate", owner("A"), None, false).unwrap());
}

#[test]
fn release_by_owner() {
    let (registry, _clock) = registry();
    registry.acquire("migrate", owner("A"), Some(60_000), None, None).unwrap();
    assert!(registry.release("migrate", owner("A"), None, false).unwrap());
    assert!(!registry.get("migrate").unwrap().held);
}

#[test]
fn extend_by_owner_preserves_acquired_at() {
    let (registry, clock) = registry();
    registry.acquire("migrate", owner("A"), Some(10_000), None, None).unwrap();
    clock.advance(Duration::from_millis(5_000));

    let outcome = registry.extend("migrate", owner("A"), 60_000, None).unwrap();
    assert_eq!(outcome.acquired_at, 1_000);
    assert_eq!(outcome.expires_at, 66_000);
}

#[test]
fn extend_by_non_owner_fails_while_held() {
    let (registry, _clock) = registry();
    registry.acquire("migrate", owner("A"), Some(60_000), None, None).unwrap();
    let err = registry.extend("migrate", owner("B"), 60_000, None).unwrap_err();
    assert_eq!(err.kind, ErrorKind::LockForbidden);
}

#[test]
fn extend_expired_acts_as_fresh_acquisition() {
    let (registry, clock) = registry();
    registry.acquire("migrate", owner("A"), Some(1_000), None, None).unwrap();
    clock.advance(Duration::from_millis(2_000));

    let outcome = registry.extend("migrate", owner("B"), 60_000, None).unwrap();
    assert_eq!(outcome.owner, "B");
    assert_eq!(outcome.acquired_at, 3_000);
}

#[test]
fn expired_lock_is_not_reported_held() {
    let (registry, clock) = registry();
    registry.acquire("migrate", owner("A"), Some(1_000), None, None).unwrap();
    clock.advance(Duration::from_millis(1_001));

    let info = registry.get("migrate").unwrap();
    assert!(!info.held);
    assert!(info.owner.is_none());
    assert!(registry.list(None).unwrap().is_empty());
}

#[test]
fn default_owner_derives_from_pid() {
    let (registry, _clock) = registry();
    let outcome = registry.acquire("migrate", None, None, Some(4242), None).unwrap();
    assert_eq!(outcome.owner, "pid:4242");
    // Default TTL from config.
    assert_eq!(outcome.expires_at, 1_000 + 300_000);
}

#[test]
fn list_filters_by_owner() {
    let (registry, _clock) = registry();
    registry.acquire("a", owner("A"), Some(60_000), None, None).unwrap();
    registry.acquire("b", owner("B"), Some(60_000), None, None).unwrap();

    assert_eq!(registry.list(None).unwrap().len(), 2);
    let only = registry.list(Some("A")).unwrap();
    assert_eq!(only.len(), 1);
    assert_eq!(only[0].name, "a");
}

#[test]
fn invalid_name_rejected() {
    let (registry, _clock) = registry();
    let err = registry.acquire("bad name", owner("A"), None, None, None).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ValidationError);
}
