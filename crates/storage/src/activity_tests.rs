// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::Store;

use super::*;

fn log_n(store: &Store, n: u64, kind: &str) {
    for i in 0..n {
        store
            .with_conn(|conn| append(conn, 1_000 + i, kind, Some("agent-1"), None, "d", None))
            .unwrap();
    }
}

#[test]
fn append_and_recent() {
    let store = Store::open_in_memory().unwrap();
    log_n(&store, 3, "service_claim");

    let filter = ActivityFilter { limit: 10, ..Default::default() };
    let rows = store.with_conn(|conn| recent(conn, &filter)).unwrap();
    assert_eq!(rows.len(), 3);
    // Newest first.
    assert!(rows[0].id > rows[2].id);
    assert_eq!(rows[0].kind, "service_claim");
}

#[test]
fn recent_filters_by_kind_and_range() {
    let store = Store::open_in_memory().unwrap();
    log_n(&store, 2, "service_claim");
    log_n(&store, 2, "lock_acquire");

    let filter = ActivityFilter {
        kind: Some("lock_acquire".to_string()),
        limit: 10,
        ..Default::default()
    };
    assert_eq!(store.with_conn(|conn| recent(conn, &filter)).unwrap().len(), 2);

    let filter = ActivityFilter { since: Some(1_001), until: Some(1_001), limit: 10, ..Default::default() };
    let in_range = store.with_conn(|conn| recent(conn, &filter)).unwrap();
    assert!(in_range.iter().all(|r| r.timestamp == 1_001));
}

#[test]
fn summary_groups_by_kind() {
    let store = Store::open_in_memory().unwrap();
    log_n(&store, 3, "service_claim");
    log_n(&store, 1, "lock_acquire");

    let summary = store.with_conn(|conn| summary(conn, 0)).unwrap();
    assert_eq!(summary[0], ("service_claim".to_string(), 3));
    assert_eq!(summary[1], ("lock_acquire".to_string(), 1));
}

#[test]
fn trim_enforces_both_bounds() {
    let store = Store::open_in_memory().unwrap();
    log_n(&store, 10, "sweep");

    // Age bound: entries at 1_000..1_004 fall before the cutoff.
    store.with_conn(|conn| trim(conn, 1_005, 100)).unwrap();
    assert_eq!(store.with_conn(count).unwrap(), 5);

    // Count bound: keep only the newest 2.
    store.with_conn(|conn| trim(conn, 0, 2)).unwrap();
    assert_eq!(store.with_conn(count).unwrap(), 2);

    let filter = ActivityFilter { limit: 10, ..Default::default() };
    let rows = store.with_conn(|conn| recent(conn, &filter)).unwrap();
    assert_eq!(rows[0].timestamp, 1_009);
    assert_eq!(rows[1].timestamp, 1_008);
}
