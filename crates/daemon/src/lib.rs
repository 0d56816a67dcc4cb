// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Port Daddy daemon
//!
//! The daemon kernel: registries, pub/sub hub, health prober, webhook
//! dispatcher, sweeper, and the HTTP/SSE transport serving both the Unix
//! socket and loopback TCP.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod env;
pub mod health;
pub mod http;
pub mod hub;
pub mod lifecycle;
pub mod metrics;
pub mod proc;
pub mod registry;
pub mod sweeper;
pub mod webhooks;

pub use http::{build_router, AppDeps, AppState, PeerKey};
pub use lifecycle::{startup, Config as DaemonConfig, Daemon, LifecycleError};
