// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn allows_up_to_limit() {
    let limiter = RateLimiter::new(3);
    assert!(limiter.allow("a", 0));
    assert!(limiter.allow("a", 1));
    assert!(limiter.allow("a", 2));
    assert!(!limiter.allow("a", 3));
}

#[test]
fn peers_are_independent() {
    let limiter = RateLimiter::new(1);
    assert!(limiter.allow("a", 0));
    assert!(!limiter.allow("a", 0));
    assert!(limiter.allow("b", 0));
}

#[test]
fn window_rolls_over() {
    let limiter = RateLimiter::new(1);
    assert!(limiter.allow("a", 0));
    assert!(!limiter.allow("a", 59_999));
    assert!(limiter.allow("a", 60_000));
}
