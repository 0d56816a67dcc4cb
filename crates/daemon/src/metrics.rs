// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory daemon counters, reported by `GET /metrics`.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    pub requests_total: AtomicU64,
    pub rate_limited_total: AtomicU64,
    pub claims_total: AtomicU64,
    pub releases_total: AtomicU64,
    pub locks_acquired_total: AtomicU64,
    pub messages_published_total: AtomicU64,
    pub sse_active: AtomicU64,
    pub longpoll_active: AtomicU64,
    pub webhook_deliveries_total: AtomicU64,
    pub webhook_failures_total: AtomicU64,
    pub sweeps_total: AtomicU64,
}

impl Metrics {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decr(counter: &AtomicU64) {
        counter.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn read(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "requests_total": Self::read(&self.requests_total),
            "rate_limited_total": Self::read(&self.rate_limited_total),
            "claims_total": Self::read(&self.claims_total),
            "releases_total": Self::read(&self.releases_total),
            "locks_acquired_total": Self::read(&self.locks_acquired_total),
            "messages_published_total": Self::read(&self.messages_published_total),
            "sse_active": Self::read(&self.sse_active),
            "longpoll_active": Self::read(&self.longpoll_active),
            "webhook_deliveries_total": Self::read(&self.webhook_deliveries_total),
            "webhook_failures_total": Self::read(&self.webhook_failures_total),
            "sweeps_total": Self::read(&self.sweeps_total),
        })
    }
}
