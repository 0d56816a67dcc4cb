// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured audit log.
//!
//! Appends are fire-and-forget: a failed append must never roll back or
//! fail the business mutation that produced it.

use std::sync::Arc;

use tracing::error;

use pd_core::{ActivityKind, ApiError, Clock};
use pd_storage::activity::{self, ActivityFilter, ActivityRow};
use pd_storage::Store;
use pd_wire::ActivityEntry;

pub struct ActivityLog<C: Clock> {
    store: Arc<Store>,
    clock: C,
}

impl<C: Clock> ActivityLog<C> {
    pub fn new(store: Arc<Store>, clock: C) -> Self {
        Self { store, clock }
    }

    /// Append an entry; failures are reported on stderr and swallowed.
    pub fn log(
        &self,
        kind: ActivityKind,
        agent_id: Option<&str>,
        target: Option<&str>,
        details: &str,
        metadata: Option<&serde_json::Value>,
    ) {
        let now = self.clock.epoch_ms();
        let metadata = metadata.map(|m| m.to_string());
        let result = self.store.with_conn(|conn| {
            activity::append(
                conn,
                now,
                kind.as_str(),
                agent_id,
                target,
                details,
                metadata.as_deref(),
            )
        });
        if let Err(e) = result {
            error!(kind = kind.as_str(), "activity append failed: {}", e);
        }
    }

    pub fn recent(&self, filter: &ActivityFilter) -> Result<Vec<ActivityEntry>, ApiError> {
        let rows = self.store.with_conn(|conn| activity::recent(conn, filter))?;
        Ok(rows.into_iter().map(to_entry).collect())
    }

    /// Counts by type since a timestamp.
    pub fn summary(&self, since: u64) -> Result<Vec<(String, u64)>, ApiError> {
        Ok(self.store.with_conn(|conn| activity::summary(conn, since))?)
    }

    pub fn count(&self) -> Result<u64, ApiError> {
        Ok(self.store.with_conn(activity::count)?)
    }
}

fn to_entry(row: ActivityRow) -> ActivityEntry {
    ActivityEntry {
        id: row.id,
        timestamp: row.timestamp,
        kind: row.kind,
        agent_id: row.agent_id,
        target: row.target,
        details: row.details,
        metadata: row.metadata.and_then(|m| serde_json::from_str(&m).ok()),
    }
}

#[cfg(test)]
#[path = "activity_tests.rs"]
mod tests;
