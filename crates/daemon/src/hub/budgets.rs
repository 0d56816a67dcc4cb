// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-peer connection budgets for SSE and long-poll.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use pd_core::{ApiError, Config, ErrorKind};

type Counts = Arc<Mutex<HashMap<String, usize>>>;

/// Connection budgets, keyed by peer (client IP, or `unix`).
pub struct Budgets {
    config: Arc<Config>,
    sse: Counts,
    longpoll: Counts,
}

/// RAII slot in a budget; dropping it frees the slot.
#[derive(Debug)]
pub struct BudgetSlot {
    counts: Counts,
    peer: String,
}

impl Drop for BudgetSlot {
    fn drop(&mut self) {
        let mut counts = self.counts.lock();
        if let Some(count) = counts.get_mut(&self.peer) {
            *count -= 1;
            if *count == 0 {
                counts.remove(&self.peer);
            }
        }
    }
}

impl Budgets {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            sse: Arc::new(Mutex::new(HashMap::new())),
            longpoll: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn acquire_sse(&self, peer: &str) -> Result<BudgetSlot, ApiError> {
        acquire(&self.sse, peer, self.config.messaging.sse_concurrent_per_ip_max, "sse")
    }

    pub fn acquire_longpoll(&self, peer: &str) -> Result<BudgetSlot, ApiError> {
        acquire(
            &self.longpoll,
            peer,
            self.config.messaging.longpoll_concurrent_per_ip_max,
            "long-poll",
        )
    }

    pub fn sse_in_use(&self, peer: &str) -> usize {
        self.sse.lock().get(peer).copied().unwrap_or(0)
    }
}

fn acquire(counts: &Counts, peer: &str, max: usize, what: &str) -> Result<BudgetSlot, ApiError> {
    let mut guard = counts.lock();
    let count = guard.entry(peer.to_string()).or_insert(0);
    if *count >= max {
        return Err(ApiError::new(
            ErrorKind::ConnectionLimit,
            format!("{} connection budget exhausted for {} ({} max)", what, peer, max),
        ));
    }
    *count += 1;
    Ok(BudgetSlot { counts: Arc::clone(counts), peer: peer.to_string() })
}

#[cfg(test)]
#[path = "budgets_tests.rs"]
mod tests;
