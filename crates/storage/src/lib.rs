// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Port Daddy storage
//!
//! One SQLite database in WAL mode holds every durable entity. The
//! [`Store`] wraps the connection in the daemon's write latch; the entity
//! modules expose row types and parameterized queries that run either
//! standalone (listings) or inside a [`Store::with_tx`] transaction
//! (read-modify-write).

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod activity;
pub mod agents;
pub mod locks;
pub mod messages;
pub mod projects;
pub mod resurrection;
mod schema;
pub mod services;
pub mod sessions;
mod store;
pub mod webhooks;

pub use store::{StorageError, Store};

/// Re-export for callers that thread a connection through entity queries.
pub use rusqlite::Connection;
