// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! agntd — the agnt control-plane daemon.

use std::process::ExitCode;

use agnt_daemon::{lifecycle, Config};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("agntd: {e}");
            return ExitCode::from(10);
        }
    };

    // File logging with env-filter control (AGNT_LOG).
    let _ = std::fs::create_dir_all(&config.state_dir);
    let appender = tracing_appender::rolling::never(
        &config.state_dir,
        config.log_path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("daemon.log")),
    );
    let (writer, _guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("AGNT_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to start runtime: {e}");
            return ExitCode::from(10);
        }
    };

    let code = runtime.block_on(run(config));
    ExitCode::from(code)
}

async fn run(config: Config) -> u8 {
    let started = match lifecycle::startup(&config).await {
        Ok(started) => started,
        Err(e) => {
            error!("startup failed: {e}");
            eprintln!("agntd: {e}");
            return e.exit_code() as u8;
        }
    };

    // Signal line for wrappers waiting on daemon readiness.
    println!("READY");

    let daemon = started.daemon;
    let hub = started.hub;
    let fatal = started.fatal;
    let shutdown = daemon.ctx.shutdown.clone();

    let hub_task = tokio::spawn(hub.run());

    let code = tokio::select! {
        _ = shutdown.notified() => {
            info!("shutdown requested");
            0
        }
        _ = fatal.notified() => {
            error!("fatal persistence failure");
            10
        }
        _ = wait_for_signal() => {
            info!("termination signal received");
            0
        }
    };

    daemon.shutdown().await;
    hub_task.abort();
    code
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(_) => return std::future::pending().await,
    };
    let mut int = match signal(SignalKind::interrupt()) {
        Ok(int) => int,
        Err(_) => return std::future::pending().await,
    };
    tokio::select! {
        _ = term.recv() => {}
        _ = int.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
