// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn signature_is_prefixed_hex() {
    let sig = signature("s3cret", b"{\"event\":\"service.claim\"}");
    let hex_part = sig.strip_prefix("sha256=").unwrap();
    assert_eq!(hex_part.len(), 64);
    assert!(hex_part.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn signature_is_deterministic() {
    assert_eq!(signature("k", b"body"), signature("k", b"body"));
}

#[test]
fn signature_varies_with_key_and_body() {
    assert_ne!(signature("k1", b"body"), signature("k2", b"body"));
    assert_ne!(signature("k", b"a"), signature("k", b"b"));
}

#[test]
fn known_vector() {
    // HMAC-SHA256("key", "The quick brown fox jumps over the lazy dog")
    let sig = signature("key", b"The quick brown fox jumps over the lazy dog");
    assert_eq!(
        sig,
        "sha256=f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
    );
}
