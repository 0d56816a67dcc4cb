// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent registry: registration, heartbeats, quotas.

use std::sync::Arc;

use pd_core::{validate, ApiError, Clock, Config, ErrorKind, Identity};
use pd_storage::agents::{self, AgentRow, NewAgent};
use pd_storage::{locks, StorageError, Store};
use pd_wire::AgentInfo;

/// Registration arguments.
#[derive(Debug, Clone, Default)]
pub struct RegisterArgs {
    pub id: String,
    pub name: Option<String>,
    pub kind: Option<String>,
    pub pid: Option<u32>,
    pub identity: Option<String>,
    pub max_services: Option<u32>,
    pub max_locks: Option<u32>,
    pub metadata: Option<serde_json::Value>,
}

pub struct AgentRegistry<C: Clock> {
    store: Arc<Store>,
    config: Arc<Config>,
    clock: C,
}

impl<C: Clock> AgentRegistry<C> {
    pub fn new(store: Arc<Store>, config: Arc<Config>, clock: C) -> Self {
        Self { store, config, clock }
    }

    /// Upsert an agent row; true when this was a first registration.
    pub fn register(&self, args: &RegisterArgs) -> Result<bool, ApiError> {
        validate::agent_id(&args.id)?;
        let metadata = validate::metadata_json(args.metadata.as_ref())?;
        let identity = args
            .identity
            .as_deref()
            .map(Identity::parse)
            .transpose()
            .map_err(|e| ApiError::new(ErrorKind::IdentityInvalid, e.to_string()))?;
        let now = self.clock.epoch_ms();

        let new = NewAgent {
            id: &args.id,
            name: args.name.as_deref(),
            kind: args.kind.as_deref().unwrap_or("cli"),
            pid: args.pid,
            identity: identity.as_ref(),
            max_services: args.max_services.unwrap_or(self.config.agents.default_max_services),
            max_locks: args.max_locks.unwrap_or(self.config.agents.default_max_locks),
            metadata: metadata.as_deref(),
            now,
        };
        Ok(self
            .store
            .with_tx::<_, ApiError>(|tx| {
                Ok(agents::register(tx, &new).map_err(StorageError::from)?)
            })?)
    }

    /// Update the heartbeat, auto-registering an unknown agent.
    pub fn heartbeat(&self, id: &str) -> Result<(), ApiError> {
        validate::agent_id(id)?;
        let now = self.clock.epoch_ms();
        self.store.with_tx::<_, ApiError>(|tx| {
            if !agents::heartbeat(tx, id, now).map_err(StorageError::from)? {
                let new = NewAgent {
                    id,
                    name: None,
                    kind: "cli",
                    pid: None,
                    identity: None,
                    max_services: self.config.agents.default_max_services,
                    max_locks: self.config.agents.default_max_locks,
                    metadata: None,
                    now,
                };
                agents::register(tx, &new).map_err(StorageError::from)?;
            }
            Ok(())
        })
    }

    /// Delete the agent and release every lock it owns.
    pub fn unregister(&self, id: &str) -> Result<bool, ApiError> {
        validate::agent_id(id)?;
        self.store.with_tx::<_, ApiError>(|tx| {
            let removed = agents::delete(tx, id).map_err(StorageError::from)?;
            locks::delete_by_owner(tx, id).map_err(StorageError::from)?;
            Ok(removed)
        })
    }

    pub fn get(&self, id: &str) -> Result<Option<AgentInfo>, ApiError> {
        let now = self.clock.epoch_ms();
        let live_ms = self.config.agents.live_ms;
        let row = self.store.with_conn(|conn| agents::get(conn, id))?;
        Ok(row.map(|row| to_info(&row, now, live_ms)))
    }

    pub fn list(&self, active_only: bool) -> Result<Vec<AgentInfo>, ApiError> {
        let now = self.clock.epoch_ms();
        let live_ms = self.config.agents.live_ms;
        let rows = self.store.with_conn(agents::list)?;
        Ok(rows
            .iter()
            .filter(|row| !active_only || row.is_active(now, live_ms))
            .map(|row| to_info(row, now, live_ms))
            .collect())
    }

    /// Quota gate for a claim attributed to `agent_id`.
    pub fn can_claim_service(&self, agent_id: &str) -> Result<(), ApiError> {
        let agent = self.store.with_conn(|conn| agents::get(conn, agent_id))?;
        let Some(agent) = agent else { return Ok(()) };
        let current =
            self.store.with_conn(|conn| pd_storage::services::count_for_agent(conn, agent_id))?;
        if current >= u64::from(agent.max_services) {
            return Err(quota_error("services", current, agent.max_services));
        }
        Ok(())
    }

    /// Quota gate for a lock acquisition owned by `agent_id`.
    pub fn can_acquire_lock(&self, agent_id: &str) -> Result<(), ApiError> {
        let agent = self.store.with_conn(|conn| agents::get(conn, agent_id))?;
        let Some(agent) = agent else { return Ok(()) };
        let current = self.store.with_conn(|conn| locks::count_for_owner(conn, agent_id))?;
        if current >= u64::from(agent.max_locks) {
            return Err(quota_error("locks", current, agent.max_locks));
        }
        Ok(())
    }
}

fn quota_error(resource: &str, current: u64, max: u32) -> ApiError {
    ApiError::new(
        ErrorKind::QuotaExceeded,
        format!("{} quota exceeded: {} of {}", resource, current, max),
    )
    .with_detail(serde_json::json!({ "allowed": false, "current": current, "max": max }))
}

fn to_info(row: &AgentRow, now: u64, live_ms: u64) -> AgentInfo {
    AgentInfo {
        id: row.id.clone(),
        name: row.name.clone(),
        kind: row.kind.clone(),
        pid: row.pid,
        identity: row.identity(),
        registered_at: row.registered_at,
        last_heartbeat: row.last_heartbeat,
        is_active: row.is_active(now, live_ms),
        max_services: row.max_services,
        max_locks: row.max_locks,
        metadata: row.metadata.as_deref().and_then(|m| serde_json::from_str(m).ok()),
    }
}

#[cfg(test)]
#[path = "agents_tests.rs"]
mod tests;
