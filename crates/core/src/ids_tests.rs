// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn session_id_shape() {
    let id = session_id();
    let suffix = id.strip_prefix("session-").unwrap();
    assert_eq!(suffix.len(), 12);
    assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn webhook_id_shape() {
    let id = webhook_id();
    let suffix = id.strip_prefix("wh-").unwrap();
    assert_eq!(suffix.len(), 10);
    assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn ids_are_unique_enough() {
    let a = session_id();
    let b = session_id();
    assert_ne!(a, b);
}
