// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use std::io::Write;
use std::sync::Arc;

use fs2::FileExt;
use tokio::net::{TcpListener, UnixListener};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use pd_core::{ActivityKind, SystemClock, WebhookEvent};
use pd_storage::Store;

use crate::health::HttpProbeClient;
use crate::http::{build_router, serve_tcp, serve_unix, AppDeps, AppState};
use crate::registry::ports::TcpProbe;
use crate::sweeper::Sweeper;

use super::{Config, LifecycleError};

/// A running daemon: shared state plus the resources startup acquired.
pub struct Daemon {
    pub state: AppState<SystemClock>,
    pub shutdown: CancellationToken,
    config: Config,
    // Held for the daemon lifetime; dropping releases the exclusive lock.
    _lock_file: std::fs::File,
}

impl Daemon {
    /// Announce shutdown, stop background work, and remove the socket.
    pub fn shutdown(&self) {
        info!("daemon stopping");
        self.state.activity.log(ActivityKind::DaemonStop, None, None, "shutdown", None);
        self.state.webhooks.trigger(
            WebhookEvent::DaemonStop,
            serde_json::json!({"pid": std::process::id()}),
            None,
        );
        self.shutdown.cancel();
        if self.config.socket_path.exists() {
            let _ = std::fs::remove_file(&self.config.socket_path);
        }
    }
}

/// Start the daemon.
pub async fn startup(config: &Config) -> Result<Daemon, LifecycleError> {
    match startup_inner(config).await {
        Ok(daemon) => Ok(daemon),
        Err(e) => {
            // Don't clean up if we failed to acquire the lock; those files
            // belong to the already-running daemon.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config) -> Result<Daemon, LifecycleError> {
    // 1. State directory first: socket, lock, and database live there.
    std::fs::create_dir_all(&config.state_dir)?;
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // 2. Acquire the lock file before touching anything shared. Open
    // without truncating so a losing race doesn't wipe the winner's pid.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // 3. Open the database; schema or permission failures abort startup.
    let store = Arc::new(Store::open(&config.db_path)?);

    // 4. Shared state and components.
    let shutdown = CancellationToken::new();
    let state = AppState::new(AppDeps {
        store,
        config: Arc::new(pd_core::Config::default()),
        clock: SystemClock,
        probe_client: Arc::new(HttpProbeClient::new()),
        occupancy: Arc::new(TcpProbe::new()),
        shutdown: shutdown.clone(),
    });

    // 5. Bind listeners last, after everything that can fail has passed.
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let unix = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;
    let tcp = TcpListener::bind(config.tcp_addr)
        .await
        .map_err(|e| LifecycleError::TcpBindFailed(config.tcp_addr, e))?;

    // 6. Serve both transports with one router.
    let router = build_router(state.clone());
    tokio::spawn(serve_unix(unix, router.clone(), shutdown.clone()));
    tokio::spawn(serve_tcp(tcp, router, shutdown.clone()));

    // 7. Background work: sweeper, plus deliveries a previous run left
    // half-done.
    let sweeper = Arc::new(Sweeper::new(
        Arc::clone(&state.store),
        Arc::clone(&state.config),
        Arc::clone(&state.resurrection),
        Arc::clone(&state.activity),
        Arc::clone(&state.webhooks),
        Arc::clone(&state.metrics),
        SystemClock,
    ));
    sweeper.spawn(shutdown.clone());
    match state.webhooks.redrive_pending() {
        Ok(0) => {}
        Ok(count) => info!("re-driving {} pending webhook deliveries", count),
        Err(e) => warn!("webhook re-drive failed: {}", e),
    }

    state.activity.log(ActivityKind::DaemonStart, None, None, "started", None);
    state.webhooks.trigger(
        WebhookEvent::DaemonStart,
        serde_json::json!({"pid": std::process::id()}),
        None,
    );
    info!(socket = %config.socket_path.display(), tcp = %config.tcp_addr, "daemon started");

    Ok(Daemon { state, shutdown, config: config.clone(), _lock_file: lock_file })
}

/// Clean up resources on startup failure.
fn cleanup_on_failure(config: &Config) {
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}
