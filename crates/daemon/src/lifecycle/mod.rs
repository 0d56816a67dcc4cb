// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup, serving, shutdown.

mod startup;

pub use startup::{startup, Daemon};

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::env;

/// Filesystem and network layout for one daemon instance.
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub socket_path: PathBuf,
    pub tcp_addr: SocketAddr,
    pub db_path: PathBuf,
    pub lock_path: PathBuf,
}

impl Config {
    /// Resolve from the environment.
    pub fn from_env() -> Result<Self, LifecycleError> {
        let state_dir = env::state_dir()?;
        Ok(Self {
            socket_path: env::socket_path(),
            tcp_addr: env::tcp_addr(),
            db_path: env::db_path()?,
            lock_path: state_dir.join("pdd.pid"),
            state_dir,
        })
    }
}

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("cannot resolve a state directory (HOME unset)")]
    NoStateDir,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("another daemon already holds the lock: {0}")]
    LockFailed(std::io::Error),

    #[error("database open failed: {0}")]
    Storage(#[from] pd_storage::StorageError),

    #[error("failed to bind unix socket {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("failed to bind tcp {0}: {1}")]
    TcpBindFailed(SocketAddr, std::io::Error),
}
