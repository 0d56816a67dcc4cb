// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advisory lock state machine: `free -> held(owner, ttl) -> free`.
//!
//! Fencing is on owner identity: only the holder may release (without
//! `force`) or extend. An expired row is dead weight awaiting the sweeper;
//! every code path treats it as free.

use std::sync::Arc;

use pd_core::{validate, ApiError, Clock, Config, ErrorKind};
use pd_storage::locks::{self, LockRow};
use pd_storage::{StorageError, Store};
use pd_wire::LockInfo;

/// Successful acquisition or extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireOutcome {
    pub owner: String,
    pub acquired_at: u64,
    pub expires_at: u64,
}

pub struct LockRegistry<C: Clock> {
    store: Arc<Store>,
    config: Arc<Config>,
    clock: C,
}

impl<C: Clock> LockRegistry<C> {
    pub fn new(store: Arc<Store>, config: Arc<Config>, clock: C) -> Self {
        Self { store, config, clock }
    }

    fn effective_owner(owner: Option<String>, pid: Option<u32>) -> String {
        owner.unwrap_or_else(|| match pid {
            Some(pid) => format!("pid:{}", pid),
            None => "anonymous".to_string(),
        })
    }

    /// Acquire `name`, or refresh it when the caller already holds it.
    pub fn acquire(
        &self,
        name: &str,
        owner: Option<String>,
        ttl: Option<u64>,
        pid: Option<u32>,
        metadata: Option<&serde_json::Value>,
    ) -> Result<AcquireOutcome, ApiError> {
        validate::lock_name(name)?;
        let metadata = validate::metadata_json(metadata)?;
        let owner = Self::effective_owner(owner, pid);
        let ttl = ttl.unwrap_or(self.config.locks.default_ttl_ms);
        let now = self.clock.epoch_ms();

        self.store.with_tx(|tx| {
            match locks::get(tx, name).map_err(StorageError::from)? {
                Some(row) if row.expires_at > now => {
                    if row.owner == owner {
                        // Idempotent re-acquire refreshes the TTL.
                        locks::extend(tx, name, now + ttl).map_err(StorageError::from)?;
                        Ok(AcquireOutcome {
                            owner,
                            acquired_at: row.acquired_at,
                            expires_at: now + ttl,
                        })
                    } else {
                        Err(held_error(&row))
                    }
                }
                _ => {
                    locks::upsert(tx, name, &owner, pid, now, now + ttl, metadata.as_deref())
                        .map_err(StorageError::from)?;
                    Ok(AcquireOutcome { owner, acquired_at: now, expires_at: now + ttl })
                }
            }
        })
    }

    /// Release `name`. Idempotent: releasing an absent or expired lock
    /// reports `false`.
    pub fn release(
        &self,
        name: &str,
        owner: Option<String>,
        pid: Option<u32>,
        force: bool,
    ) -> Result<bool, ApiError> {
        validate::lock_name(name)?;
        let owner = Self::effective_owner(owner, pid);
        let now = self.clock.epoch_ms();

        self.store.with_tx(|tx| {
            match locks::get(tx, name).map_err(StorageError::from)? {
                None => Ok(false),
                Some(row) if row.expires_at <= now => {
                    // Expired: anyone may clear the residue.
                    locks::delete(tx, name).map_err(StorageError::from)?;
                    Ok(true)
                }
                Some(row) => {
                    if force || row.owner == owner {
                        locks::delete(tx, name).map_err(StorageError::from)?;
                        Ok(true)
                    } else {
                        Err(ApiError::new(
                            ErrorKind::LockForbidden,
                            format!("lock {:?} is held by {:?}", name, row.owner),
                        )
                        .with_detail(serde_json::json!({ "holder": row.owner })))
                    }
                }
            }
        })
    }

    /// Extend `name` for its current owner. On an absent or expired lock
    /// this behaves as a fresh acquisition.
    pub fn extend(
        &self,
        name: &str,
        owner: Option<String>,
        ttl: u64,
        pid: Option<u32>,
    ) -> Result<AcquireOutcome, ApiError> {
        validate::lock_name(name)?;
        let owner = Self::effective_owner(owner, pid);
        let now = self.clock.epoch_ms();

        self.store.with_tx(|tx| {
            match locks::get(tx, name).map_err(StorageError::from)? {
                Some(row) if row.expires_at > now => {
                    if row.owner != owner {
                        return Err(ApiError::new(
                            ErrorKind::LockForbidden,
                            format!("lock {:?} is held by {:?}", name, row.owner),
                        )
                        .with_detail(serde_json::json!({ "holder": row.owner })));
                    }
                    locks::extend(tx, name, now + ttl).map_err(StorageError::from)?;
                    Ok(AcquireOutcome {
                        owner,
                        acquired_at: row.acquired_at,
                        expires_at: now + ttl,
                    })
                }
                _ => {
                    locks::upsert(tx, name, &owner, pid, now, now + ttl, None)
                        .map_err(StorageError::from)?;
                    Ok(AcquireOutcome { owner, acquired_at: now, expires_at: now + ttl })
                }
            }
        })
    }

    pub fn get(&self, name: &str) -> Result<LockInfo, ApiError> {
        validate::lock_name(name)?;
        let now = self.clock.epoch_ms();
        let row = self.store.with_conn(|conn| locks::get(conn, name))?;
        Ok(match row {
            Some(row) if row.expires_at > now => to_info(&row, true),
            _ => LockInfo {
                name: name.to_string(),
                held: false,
                owner: None,
                pid: None,
                acquired_at: None,
                expires_at: None,
            },
        })
    }

    /// All unexpired locks, optionally filtered by owner.
    pub fn list(&self, owner: Option<&str>) -> Result<Vec<LockInfo>, ApiError> {
        let now = self.clock.epoch_ms();
        let rows = self.store.with_conn(|conn| locks::list(conn, owner))?;
        Ok(rows
            .iter()
            .filter(|row| row.expires_at > now)
            .map(|row| to_info(row, true))
            .collect())
    }
}

fn held_error(row: &LockRow) -> ApiError {
    ApiError::new(ErrorKind::LockHeld, format!("lock {:?} is held by {:?}", row.name, row.owner))
        .with_detail(serde_json::json!({
            "holder": row.owner,
            "since": row.acquired_at,
            "expiresAt": row.expires_at,
        }))
}

fn to_info(row: &LockRow, held: bool) -> LockInfo {
    LockInfo {
        name: row.name.clone(),
        held,
        owner: Some(row.owner.clone()),
        pid: row.pid,
        acquired_at: Some(row.acquired_at),
        expires_at: Some(row.expires_at),
    }
}

#[cfg(test)]
#[path = "locks_tests.rs"]
mod tests;
