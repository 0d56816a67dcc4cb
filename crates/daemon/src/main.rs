// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pdd` — the Port Daddy daemon.

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pd_daemon::lifecycle::{startup, Config};

fn init_tracing(state_dir: &std::path::Path) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let logs_dir = state_dir.join("logs");
    if std::fs::create_dir_all(&logs_dir).is_ok() {
        let appender = tracing_appender::rolling::daily(&logs_dir, "pdd.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        None
    }
}

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("pdd: {}", e);
            std::process::exit(1);
        }
    };
    let _log_guard = init_tracing(&config.state_dir);

    let daemon = match startup(&config).await {
        Ok(daemon) => daemon,
        Err(e) => {
            eprintln!("pdd: startup failed: {}", e);
            error!("startup failed: {}", e);
            std::process::exit(1);
        }
    };

    wait_for_signal().await;
    daemon.shutdown();
    // Give in-flight handlers a moment to observe cancellation.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    info!("bye");
}

async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            error!("cannot install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
        _ = term.recv() => info!("received SIGTERM"),
    }
}
