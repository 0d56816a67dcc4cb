// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service lease lifecycle: claim, renew, release, lookup.

use std::collections::HashSet;
use std::sync::Arc;

use pd_core::{validate, ApiError, Clock, ErrorKind, Identity, Pattern};
use pd_storage::services::{self, NewService, ReleasedLease, ServiceFilter, ServiceRow};
use pd_storage::{StorageError, Store};
use pd_wire::ServiceInfo;

use crate::proc::pid_alive;
use crate::registry::ports::PortAllocator;

/// Arguments to a claim, already transport-validated.
#[derive(Debug, Clone, Default)]
pub struct ClaimArgs {
    pub id: String,
    pub port: Option<u16>,
    pub range: Option<(u16, u16)>,
    /// TTL in milliseconds.
    pub expires_ms: Option<u64>,
    pub pair: Option<String>,
    pub cmd: Option<String>,
    pub cwd: Option<String>,
    pub pid: Option<u32>,
    pub agent_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Result of a claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimOutcome {
    pub id: String,
    pub port: u16,
    pub existing: bool,
}

/// Result of a release.
#[derive(Debug, Clone, Default)]
pub struct ReleaseOutcome {
    pub released: Vec<ReleasedLease>,
}

pub struct ServiceRegistry<C: Clock> {
    store: Arc<Store>,
    allocator: Arc<PortAllocator>,
    clock: C,
}

impl<C: Clock> ServiceRegistry<C> {
    pub fn new(store: Arc<Store>, allocator: Arc<PortAllocator>, clock: C) -> Self {
        Self { store, allocator, clock }
    }

    /// Claim a port under `args.id`, reusing an active lease when the
    /// caller is its owner or the owning pid is still alive.
    pub fn claim(&self, args: &ClaimArgs) -> Result<ClaimOutcome, ApiError> {
        let identity = parse_identity(&args.id)?;
        let metadata = validate::metadata_json(args.metadata.as_ref())?;
        let now = self.clock.epoch_ms();
        let expires_at = args.expires_ms.map(|ttl| now + ttl);

        self.store.with_tx(|tx| {
            if let Some(existing) = services::get(tx, &args.id).map_err(StorageError::from)? {
                let same_agent = args.agent_id.is_some()
                    && existing.agent_id.as_deref() == args.agent_id.as_deref();
                let owner_alive = existing.pid.map(pid_alive).unwrap_or(false);
                if same_agent || owner_alive {
                    services::touch(tx, &args.id, now, expires_at)
                        .map_err(StorageError::from)?;
                    return Ok(ClaimOutcome {
                        id: existing.identity,
                        port: existing.port,
                        existing: true,
                    });
                }
                // Owner is gone: replace the lease.
                services::delete_exact(tx, &args.id).map_err(StorageError::from)?;
            }

            let leased: HashSet<u16> = services::leased_ports(tx)
                .map_err(StorageError::from)?
                .into_iter()
                .collect();
            let port =
                self.allocator.allocate(&args.id, args.port, args.range, &leased)?;
            services::insert(
                tx,
                &NewService {
                    identity: &identity,
                    port,
                    pid: args.pid,
                    cmd: args.cmd.as_deref(),
                    cwd: args.cwd.as_deref(),
                    pair: args.pair.as_deref(),
                    metadata: metadata.as_deref(),
                    agent_id: args.agent_id.as_deref(),
                    now,
                    expires_at,
                },
            )
            .map_err(StorageError::from)?;
            Ok(ClaimOutcome { id: identity.to_string(), port, existing: false })
        })
    }

    /// Release by exact id or glob pattern.
    pub fn release(&self, pattern: &str) -> Result<ReleaseOutcome, ApiError> {
        let pattern = parse_pattern(pattern)?;
        let released = self
            .store
            .with_tx::<_, ApiError>(|tx| {
                Ok(services::delete_by_pattern(tx, &pattern).map_err(StorageError::from)?)
            })?;
        Ok(ReleaseOutcome { released })
    }

    /// Release every lease with `expires_at <= now`.
    pub fn release_expired(&self) -> Result<ReleaseOutcome, ApiError> {
        let now = self.clock.epoch_ms();
        let released = self
            .store
            .with_tx::<_, ApiError>(|tx| {
                Ok(services::delete_expired(tx, now).map_err(StorageError::from)?)
            })?;
        Ok(ReleaseOutcome { released })
    }

    pub fn get(&self, id: &str) -> Result<Option<ServiceInfo>, ApiError> {
        let row = self.store.with_conn(|conn| services::get(conn, id))?;
        match row {
            Some(row) => {
                let endpoints = self.store.with_conn(|conn| services::endpoints(conn, id))?;
                Ok(Some(to_info(row, endpoints)))
            }
            None => Ok(None),
        }
    }

    pub fn find(
        &self,
        pattern: Option<&str>,
        status: Option<String>,
        port: Option<u16>,
        expired: bool,
    ) -> Result<Vec<ServiceInfo>, ApiError> {
        let pattern = pattern.map(parse_pattern).transpose()?;
        let filter = ServiceFilter {
            pattern,
            status,
            port,
            expired_before: expired.then(|| self.clock.epoch_ms()),
        };
        let rows = self.store.with_conn(|conn| services::find(conn, &filter))?;
        let mut infos = Vec::with_capacity(rows.len());
        for row in rows {
            let endpoints =
                self.store.with_conn(|conn| services::endpoints(conn, &row.identity))?;
            infos.push(to_info(row, endpoints));
        }
        Ok(infos)
    }

    /// Record a `(env, url)` endpoint on an existing lease.
    pub fn set_endpoint(&self, id: &str, env: &str, url: &str) -> Result<(), ApiError> {
        validate::env_name(env)?;
        if url::Url::parse(url).is_err() {
            return Err(ApiError::validation(format!("invalid url: {:?}", url)));
        }
        self.store.with_tx(|tx| {
            if services::get(tx, id).map_err(StorageError::from)?.is_none() {
                return Err(ApiError::new(
                    ErrorKind::ServiceNotFound,
                    format!("no service {:?}", id),
                ));
            }
            services::set_endpoint(tx, id, env, url).map_err(StorageError::from)?;
            Ok(())
        })
    }

    /// Active leases with a real liveness probe of each owning pid.
    pub fn active_ports(&self) -> Result<Vec<pd_wire::PortStatus>, ApiError> {
        let rows = self.store.with_conn(|conn| {
            services::find(conn, &ServiceFilter::default())
        })?;
        Ok(rows
            .into_iter()
            .map(|row| pd_wire::PortStatus {
                port: row.port,
                id: row.identity,
                pid: row.pid,
                alive: row.pid.map(pid_alive).unwrap_or(false),
            })
            .collect())
    }

    pub fn count(&self) -> Result<u64, ApiError> {
        Ok(self.store.with_conn(pd_storage::services::count)?)
    }

    /// Free expired leases and leases whose owning pid died.
    pub fn cleanup(&self) -> Result<Vec<ReleasedLease>, ApiError> {
        let mut freed = self.release_expired()?.released;
        let with_pids = self.store.with_conn(services::with_pids)?;
        for (identity, _port, pid) in with_pids {
            if pid_alive(pid) {
                continue;
            }
            let removed = self.store.with_tx::<_, ApiError>(|tx| {
                Ok(services::delete_exact(tx, &identity).map_err(StorageError::from)?)
            })?;
            if let Some(lease) = removed {
                freed.push(lease);
            }
        }
        Ok(freed)
    }
}

fn parse_identity(s: &str) -> Result<Identity, ApiError> {
    Identity::parse(s)
        .map_err(|e| ApiError::new(ErrorKind::IdentityInvalid, e.to_string()))
}

fn parse_pattern(s: &str) -> Result<Pattern, ApiError> {
    Pattern::parse(s)
        .map_err(|e| ApiError::new(ErrorKind::IdentityInvalid, e.to_string()))
}

fn to_info(row: ServiceRow, endpoints: Vec<(String, String)>) -> ServiceInfo {
    ServiceInfo {
        id: row.identity,
        project: row.project,
        stack: row.stack,
        context: row.context,
        port: row.port,
        pid: row.pid,
        cmd: row.cmd,
        cwd: row.cwd,
        status: row.status,
        pair: row.pair,
        created_at: row.created_at,
        last_seen: row.last_seen,
        expires_at: row.expires_at,
        endpoints: endpoints.into_iter().collect(),
        metadata: row.metadata.and_then(|m| serde_json::from_str(&m).ok()),
    }
}

#[cfg(test)]
#[path = "services_tests.rs"]
mod tests;
