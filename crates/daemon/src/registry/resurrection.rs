// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resurrection queue: recoverable work left by agents whose heartbeats
//! lapsed. Every transition is announced on the `resurrection` channel.

use std::sync::Arc;

use tracing::warn;

use pd_core::{ApiError, Clock, ErrorKind};
use pd_storage::resurrection::{self, ResurrectionRow};
use pd_storage::{sessions, StorageError, Store};
use pd_wire::ResurrectionEntry;

use crate::hub::Messaging;

const CHANNEL: &str = "resurrection";

pub struct ResurrectionQueue<C: Clock> {
    store: Arc<Store>,
    config: Arc<pd_core::Config>,
    messaging: Arc<Messaging<C>>,
    clock: C,
}

impl<C: Clock> ResurrectionQueue<C> {
    pub fn new(
        store: Arc<Store>,
        config: Arc<pd_core::Config>,
        messaging: Arc<Messaging<C>>,
        clock: C,
    ) -> Self {
        Self { store, config, messaging, clock }
    }

    /// Sweeper entry: enqueue a lapsed agent, copying its identity and the
    /// purpose of its most recent active session. Idempotent.
    pub fn enqueue_stale(&self, agent: &pd_storage::agents::AgentRow) -> Result<bool, ApiError> {
        let now = self.clock.epoch_ms();
        let enqueued = self.store.with_tx::<_, ApiError>(|tx| {
            let session = sessions::active_for_agent(tx, &agent.id).map_err(StorageError::from)?;
            Ok(resurrection::enqueue_stale(
                tx,
                &agent.id,
                agent.project.as_deref(),
                agent.stack.as_deref(),
                agent.context.as_deref(),
                session.as_ref().map(|s| s.purpose.as_str()),
                session.as_ref().map(|s| s.id.as_str()),
                now,
            )
            .map_err(StorageError::from)?)
        })?;
        if enqueued {
            self.announce("stale", &agent.id, None);
        }
        Ok(enqueued)
    }

    /// Sweeper entry: promote long-stale entries to `dead`.
    pub fn promote_dead(&self) -> Result<Vec<String>, ApiError> {
        let now = self.clock.epoch_ms();
        // stale_at + (dead_ms - stale_ms) is when an entry turns dead.
        let dead_after = self.dead_after_ms();
        let promoted = self.store.with_tx::<_, ApiError>(|tx| {
            Ok(resurrection::promote_dead(tx, now, dead_after).map_err(StorageError::from)?)
        })?;
        for agent_id in &promoted {
            self.announce("dead", agent_id, None);
        }
        Ok(promoted)
    }

    fn dead_after_ms(&self) -> u64 {
        // Queue entries are created at T_stale; they become dead at T_dead.
        self.config.agents.dead_ms.saturating_sub(self.config.agents.stale_ms)
    }

    pub fn list(
        &self,
        project: Option<&str>,
        stack: Option<&str>,
        status: Option<&str>,
    ) -> Result<Vec<ResurrectionEntry>, ApiError> {
        let rows = self
            .store
            .with_conn(|conn| resurrection::list(conn, project, stack, status))?;
        Ok(rows.into_iter().map(to_entry).collect())
    }

    /// Entries still waiting to be picked up (`stale` or `dead`).
    pub fn pending(
        &self,
        project: Option<&str>,
        stack: Option<&str>,
    ) -> Result<Vec<ResurrectionEntry>, ApiError> {
        let rows = self
            .store
            .with_conn(|conn| resurrection::list(conn, project, stack, None))?;
        Ok(rows
            .into_iter()
            .filter(|row| row.status == "stale" || row.status == "dead")
            .map(to_entry)
            .collect())
    }

    /// `stale|dead -> resurrecting`.
    pub fn claim(
        &self,
        agent_id: &str,
        claimed_by: Option<&str>,
    ) -> Result<ResurrectionEntry, ApiError> {
        let entry = self.store.with_tx(|tx| {
            let Some(row) = resurrection::get(tx, agent_id).map_err(StorageError::from)? else {
                return Err(not_found(agent_id));
            };
            if !resurrection::claim(tx, agent_id, claimed_by).map_err(StorageError::from)? {
                return Err(ApiError::validation(format!(
                    "agent {:?} is already being resurrected",
                    agent_id
                )));
            }
            resurrection::get(tx, agent_id)
                .map_err(StorageError::from)?
                .ok_or_else(|| ApiError::internal("claimed entry vanished"))
        })?;
        self.announce("claimed", agent_id, claimed_by);
        Ok(to_entry(entry))
    }

    /// Remove the entry and re-parent the dead agent's in-flight work.
    pub fn complete(&self, old_id: &str, new_id: &str) -> Result<usize, ApiError> {
        let now = self.clock.epoch_ms();
        let moved = self.store.with_tx(|tx| {
            if resurrection::get(tx, old_id).map_err(StorageError::from)?.is_none() {
                return Err(not_found(old_id));
            }
            let moved =
                sessions::reparent_agent(tx, old_id, new_id, now).map_err(StorageError::from)?;
            resurrection::delete(tx, old_id).map_err(StorageError::from)?;
            Ok(moved)
        })?;
        self.announce("completed", old_id, Some(new_id));
        Ok(moved)
    }

    /// Revert a claim to the entry's prior status.
    pub fn abandon(&self, agent_id: &str) -> Result<(), ApiError> {
        self.store.with_tx(|tx| {
            if resurrection::get(tx, agent_id).map_err(StorageError::from)?.is_none() {
                return Err(not_found(agent_id));
            }
            if !resurrection::abandon(tx, agent_id).map_err(StorageError::from)? {
                return Err(ApiError::validation(format!(
                    "agent {:?} is not being resurrected",
                    agent_id
                )));
            }
            Ok(())
        })?;
        self.announce("abandoned", agent_id, None);
        Ok(())
    }

    /// Drop the entry without recovering its work.
    pub fn dismiss(&self, agent_id: &str) -> Result<(), ApiError> {
        let removed = self.store.with_tx::<_, ApiError>(|tx| {
            Ok(resurrection::delete(tx, agent_id).map_err(StorageError::from)?)
        })?;
        if !removed {
            return Err(not_found(agent_id));
        }
        self.announce("dismissed", agent_id, None);
        Ok(())
    }

    fn announce(&self, transition: &str, agent_id: &str, other: Option<&str>) {
        let payload = serde_json::json!({
            "transition": transition,
            "agentId": agent_id,
            "newAgentId": other,
        });
        if let Err(e) = self.messaging.publish(CHANNEL, &payload, Some("daemon"), None) {
            warn!(agent_id, transition, "resurrection announce failed: {}", e);
        }
    }
}

fn not_found(agent_id: &str) -> ApiError {
    ApiError::new(
        ErrorKind::ServiceNotFound,
        format!("no resurrection entry for {:?}", agent_id),
    )
}

fn to_entry(row: ResurrectionRow) -> ResurrectionEntry {
    let identity = row.project.as_ref().map(|project| {
        let mut s = project.clone();
        if let Some(stack) = &row.stack {
            s.push(':');
            s.push_str(stack);
            if let Some(context) = &row.context {
                s.push(':');
                s.push_str(context);
            }
        }
        s
    });
    ResurrectionEntry {
        agent_id: row.agent_id,
        identity,
        purpose: row.purpose,
        session_id: row.session_id,
        status: row.status,
        stale_at: row.stale_at,
        dead_at: row.dead_at,
        claimed_by: row.claimed_by,
    }
}

#[cfg(test)]
#[path = "resurrection_tests.rs"]
mod tests;
