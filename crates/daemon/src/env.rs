// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::lifecycle::LifecycleError;

/// Daemon version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default Unix socket path, overridable via `PORT_DADDY_SOCK`.
pub fn socket_path() -> PathBuf {
    match std::env::var("PORT_DADDY_SOCK") {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from("/tmp/port-daddy.sock"),
    }
}

/// Loopback TCP address. `PORT_DADDY_URL` accepts `host:port` or a full
/// `http://host:port` URL; anything unparsable falls back to the default.
pub fn tcp_addr() -> SocketAddr {
    let fallback: SocketAddr = SocketAddr::from(([127, 0, 0, 1], 9876));
    let Ok(raw) = std::env::var("PORT_DADDY_URL") else { return fallback };
    let trimmed = raw.trim_start_matches("http://").trim_end_matches('/');
    trimmed.parse().unwrap_or(fallback)
}

/// Resolve the state directory:
/// `PORT_DADDY_STATE_DIR` > `XDG_STATE_HOME/port-daddy` > `~/.local/state/port-daddy`.
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("PORT_DADDY_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("port-daddy"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/port-daddy"))
}

/// Database path: `PORT_DADDY_DB` > `<state dir>/port-registry.db`.
pub fn db_path() -> Result<PathBuf, LifecycleError> {
    if let Ok(path) = std::env::var("PORT_DADDY_DB") {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    Ok(state_dir()?.join("port-registry.db"))
}
