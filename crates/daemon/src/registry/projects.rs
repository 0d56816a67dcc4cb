// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project records: persisted scan results from external tooling.

use std::sync::Arc;

use pd_core::{ApiError, Clock, ErrorKind};
use pd_storage::projects::{self, ProjectRow};
use pd_storage::{StorageError, Store};

pub struct ProjectRegistry<C: Clock> {
    store: Arc<Store>,
    clock: C,
}

/// Upsert arguments; blobs arrive pre-serialized from the wire.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpsert {
    pub id: String,
    pub root: String,
    pub kind: Option<String>,
    pub config: Option<serde_json::Value>,
    pub services: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
}

impl<C: Clock> ProjectRegistry<C> {
    pub fn new(store: Arc<Store>, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn upsert(&self, args: &ProjectUpsert) -> Result<(), ApiError> {
        if args.id.is_empty() || args.id.len() > 64 {
            return Err(ApiError::validation("invalid project id"));
        }
        if args.root.is_empty() {
            return Err(ApiError::validation("project root must not be empty"));
        }
        let now = self.clock.epoch_ms();
        let config = args.config.as_ref().map(|v| v.to_string());
        let services = args.services.as_ref().map(|v| v.to_string());
        let metadata = pd_core::validate::metadata_json(args.metadata.as_ref())?;
        self.store.with_tx::<_, ApiError>(|tx| {
            Ok(projects::upsert(
                tx,
                &args.id,
                &args.root,
                args.kind.as_deref(),
                config.as_deref(),
                services.as_deref(),
                metadata.as_deref(),
                now,
            )
            .map_err(StorageError::from)?)
        })
    }

    pub fn get(&self, id: &str) -> Result<ProjectRow, ApiError> {
        self.store
            .with_conn(|conn| projects::get(conn, id))?
            .ok_or_else(|| {
                ApiError::new(ErrorKind::ServiceNotFound, format!("no project {:?}", id))
            })
    }

    pub fn list(&self) -> Result<Vec<ProjectRow>, ApiError> {
        Ok(self.store.with_conn(projects::list)?)
    }

    pub fn remove(&self, id: &str) -> Result<bool, ApiError> {
        Ok(self
            .store
            .with_tx::<_, ApiError>(|tx| Ok(projects::delete(tx, id).map_err(StorageError::from)?))?)
    }
}
