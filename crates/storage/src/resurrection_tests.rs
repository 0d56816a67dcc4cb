// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::Store;

use super::*;

fn enqueue(store: &Store, agent_id: &str, now: u64) -> bool {
    store
        .with_conn(|conn| {
            enqueue_stale(
                conn,
                agent_id,
                Some("acme"),
                Some("api"),
                None,
                Some("deploy"),
                Some("session-1"),
                now,
            )
        })
        .unwrap()
}

#[test]
fn enqueue_is_idempotent() {
    let store = Store::open_in_memory().unwrap();
    assert!(enqueue(&store, "agent-x", 1_000));
    assert!(!enqueue(&store, "agent-x", 2_000));

    let row = store.with_conn(|conn| get(conn, "agent-x")).unwrap().unwrap();
    assert_eq!(row.status, "stale");
    assert_eq!(row.stale_at, 1_000);
    assert_eq!(row.purpose.as_deref(), Some("deploy"));
}

#[test]
fn promote_dead_after_cutoff() {
    let store = Store::open_in_memory().unwrap();
    enqueue(&store, "agent-x", 1_000);
    enqueue(&store, "agent-y", 500_000);

    let promoted = store.with_conn(|conn| promote_dead(conn, 901_500, 900_000)).unwrap();
    assert_eq!(promoted, vec!["agent-x".to_string()]);

    let row = store.with_conn(|conn| get(conn, "agent-x")).unwrap().unwrap();
    assert_eq!(row.status, "dead");
    assert_eq!(row.dead_at, Some(901_500));
    let other = store.with_conn(|conn| get(conn, "agent-y")).unwrap().unwrap();
    assert_eq!(other.status, "stale");
}

#[test]
fn claim_transitions_once() {
    let store = Store::open_in_memory().unwrap();
    enqueue(&store, "agent-x", 1_000);

    assert!(store.with_conn(|conn| claim(conn, "agent-x", Some("me"))).unwrap());
    // Already resurrecting: a second claim fails.
    assert!(!store.with_conn(|conn| claim(conn, "agent-x", Some("you"))).unwrap());
    assert!(!store.with_conn(|conn| claim(conn, "ghost", None)).unwrap());

    let row = store.with_conn(|conn| get(conn, "agent-x")).unwrap().unwrap();
    assert_eq!(row.status, "resurrecting");
    assert_eq!(row.claimed_by.as_deref(), Some("me"));
}

#[test]
fn abandon_reverts_to_prior_status() {
    let store = Store::open_in_memory().unwrap();
    enqueue(&store, "agent-x", 1_000);
    store.with_conn(|conn| claim(conn, "agent-x", None)).unwrap();
    assert!(store.with_conn(|conn| abandon(conn, "agent-x")).unwrap());
    let row = store.with_conn(|conn| get(conn, "agent-x")).unwrap().unwrap();
    assert_eq!(row.status, "stale");

    // After promotion, abandon falls back to dead.
    store.with_conn(|conn| promote_dead(conn, 1_000_000, 0)).unwrap();
    store.with_conn(|conn| claim(conn, "agent-x", None)).unwrap();
    store.with_conn(|conn| abandon(conn, "agent-x")).unwrap();
    let row = store.with_conn(|conn| get(conn, "agent-x")).unwrap().unwrap();
    assert_eq!(row.status, "dead");
}

#[test]
fn list_filters_by_prefix_and_status() {
    let store = Store::open_in_memory().unwrap();
    enqueue(&store, "agent-x", 1_000);
    store
        .with_conn(|conn| {
            enqueue_stale(conn, "agent-z", Some("beta"), None, None, None, None, 1_000)
        })
        .unwrap();

    let acme = store.with_conn(|conn| list(conn, Some("acme"), None, None)).unwrap();
    assert_eq!(acme.len(), 1);
    assert_eq!(acme[0].agent_id, "agent-x");

    let stale = store.with_conn(|conn| list(conn, None, None, Some("stale"))).unwrap();
    assert_eq!(stale.len(), 2);
}

#[test]
fn dismiss_deletes() {
    let store = Store::open_in_memory().unwrap();
    enqueue(&store, "agent-x", 1_000);
    assert!(store.with_conn(|conn| delete(conn, "agent-x")).unwrap());
    assert!(store.with_conn(|conn| get(conn, "agent-x")).unwrap().is_none());
}
