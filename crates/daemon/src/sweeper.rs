// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background sweeper: enforces every TTL-based invariant.
//!
//! Each step runs in its own transaction so one failing step never blocks
//! the rest of the sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use pd_core::{ActivityKind, ApiError, Clock, Config, WebhookEvent};
use pd_storage::{locks, messages, services, StorageError, Store};

use crate::metrics::Metrics;
use crate::proc::pid_alive;
use crate::registry::activity::ActivityLog;
use crate::registry::resurrection::ResurrectionQueue;
use crate::webhooks::WebhookDispatcher;

/// Counts from one sweep, for logs and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_leases: usize,
    pub dead_pid_leases: usize,
    pub expired_locks: usize,
    pub expired_messages: usize,
    pub stale_agents: usize,
    pub promoted_dead: usize,
    pub trimmed_activity: usize,
}

impl SweepReport {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub struct Sweeper<C: Clock> {
    store: Arc<Store>,
    config: Arc<Config>,
    resurrection: Arc<ResurrectionQueue<C>>,
    activity: Arc<ActivityLog<C>>,
    webhooks: Arc<WebhookDispatcher<C>>,
    metrics: Arc<Metrics>,
    clock: C,
}

impl<C: Clock> Sweeper<C> {
    pub fn new(
        store: Arc<Store>,
        config: Arc<Config>,
        resurrection: Arc<ResurrectionQueue<C>>,
        activity: Arc<ActivityLog<C>>,
        webhooks: Arc<WebhookDispatcher<C>>,
        metrics: Arc<Metrics>,
        clock: C,
    ) -> Self {
        Self { store, config, resurrection, activity, webhooks, metrics, clock }
    }

    /// Run until the shutdown token fires.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        let interval = Duration::from_millis(self.config.sweeper.interval_ms.max(100));
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(interval) => {}
                }
                let report = self.sweep_once();
                if !report.is_empty() {
                    debug!(?report, "sweep");
                }
            }
        })
    }

    /// One full sweep pass.
    pub fn sweep_once(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let now = self.clock.epoch_ms();
        Metrics::bump(&self.metrics.sweeps_total);

        // 1. Expired leases.
        match self.store.with_tx::<_, ApiError>(|tx| {
            Ok(services::delete_expired(tx, now).map_err(StorageError::from)?)
        }) {
            Ok(released) => {
                report.expired_leases = released.len();
                for lease in released {
                    self.webhooks.trigger(
                        WebhookEvent::ServiceRelease,
                        serde_json::json!({"id": lease.identity, "port": lease.port, "reason": "expired"}),
                        Some(&lease.identity),
                    );
                }
            }
            Err(e) => warn!("sweep: expired leases failed: {}", e),
        }

        // 2. Leases whose owning pid died, plus that pid's locks.
        match self.store.with_conn(services::with_pids) {
            Ok(rows) => {
                for (identity, port, pid) in rows {
                    if pid_alive(pid) {
                        continue;
                    }
                    let removed = self.store.with_tx::<_, ApiError>(|tx| {
                        services::delete_exact(tx, &identity).map_err(StorageError::from)?;
                        locks::delete_by_pid(tx, pid).map_err(StorageError::from)?;
                        Ok(())
                    });
                    match removed {
                        Ok(()) => {
                            report.dead_pid_leases += 1;
                            self.webhooks.trigger(
                                WebhookEvent::ServiceRelease,
                                serde_json::json!({"id": identity, "port": port, "reason": "pid_dead"}),
                                Some(&identity),
                            );
                        }
                        Err(e) => warn!(identity, "sweep: dead-pid removal failed: {}", e),
                    }
                }
            }
            Err(e) => warn!("sweep: pid scan failed: {}", e),
        }

        // 3. Expired locks.
        match self.store.with_tx::<_, ApiError>(|tx| {
            Ok(locks::delete_expired(tx, now).map_err(StorageError::from)?)
        }) {
            Ok(count) => report.expired_locks = count,
            Err(e) => warn!("sweep: expired locks failed: {}", e),
        }

        // 4. Expired messages.
        match self.store.with_tx::<_, ApiError>(|tx| {
            Ok(messages::delete_expired(tx, now).map_err(StorageError::from)?)
        }) {
            Ok(count) => report.expired_messages = count,
            Err(e) => warn!("sweep: expired messages failed: {}", e),
        }

        // 5. Stale agents into the resurrection queue.
        match self.store.with_conn(|conn| {
            pd_storage::agents::stale(conn, now, self.config.agents.stale_ms)
        }) {
            Ok(stale) => {
                for agent in stale {
                    match self.resurrection.enqueue_stale(&agent) {
                        Ok(true) => {
                            report.stale_agents += 1;
                            let release = self.store.with_tx::<_, ApiError>(|tx| {
                                Ok(locks::delete_by_owner(tx, &agent.id)
                                    .map_err(StorageError::from)?)
                            });
                            if let Err(e) = release {
                                warn!(agent = %agent.id, "sweep: lock release failed: {}", e);
                            }
                            self.activity.log(
                                ActivityKind::AgentStale,
                                Some(&agent.id),
                                None,
                                "agent moved to resurrection queue",
                                None,
                            );
                            self.webhooks.trigger(
                                WebhookEvent::AgentStale,
                                serde_json::json!({"agentId": agent.id}),
                                agent.identity().as_deref(),
                            );
                        }
                        Ok(false) => {}
                        Err(e) => warn!(agent = %agent.id, "sweep: enqueue failed: {}", e),
                    }
                }
            }
            Err(e) => warn!("sweep: stale agent scan failed: {}", e),
        }
        match self.resurrection.promote_dead() {
            Ok(promoted) => report.promoted_dead = promoted.len(),
            Err(e) => warn!("sweep: dead promotion failed: {}", e),
        }

        // 6. Activity retention.
        let cutoff = now.saturating_sub(self.config.activity.retention_ms);
        match self.store.with_tx::<_, ApiError>(|tx| {
            Ok(pd_storage::activity::trim(tx, cutoff, self.config.activity.max_entries)
                .map_err(StorageError::from)?)
        }) {
            Ok(count) => report.trimmed_activity = count,
            Err(e) => warn!("sweep: activity trim failed: {}", e),
        }

        report
    }
}

#[cfg(test)]
#[path = "sweeper_tests.rs"]
mod tests;
