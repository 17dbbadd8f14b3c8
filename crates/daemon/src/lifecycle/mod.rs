// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

mod startup;
pub use startup::{startup, StartupResult};

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::env;
use crate::hub::HubCtx;

/// Daemon configuration: every on-disk path in one place.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/agnt)
    pub state_dir: PathBuf,
    /// Per-user IPC socket
    pub socket_path: PathBuf,
    /// Lock/PID file
    pub lock_path: PathBuf,
    /// Daemon log file
    pub log_path: PathBuf,
    /// State snapshot
    pub state_path: PathBuf,
    /// Scheduler task file
    pub scheduler_path: PathBuf,
    /// Managed PID file
    pub pidtracker_path: PathBuf,
}

impl Config {
    /// Resolve paths from the environment. One daemon serves all projects
    /// for a user.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = env::state_dir().ok_or(LifecycleError::NoStateDir)?;
        Ok(Self {
            socket_path: env::socket_path(),
            lock_path: state_dir.join("daemon.pid"),
            log_path: state_dir.join("daemon.log"),
            state_path: state_dir.join("state.json"),
            scheduler_path: state_dir.join("scheduler.json"),
            pidtracker_path: state_dir.join("pidtracker.json"),
            state_dir,
        })
    }
}

/// Live daemon state held by `main` while the hub runs.
#[derive(Debug)]
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): held to maintain the exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub ctx: Arc<HubCtx>,
    /// Cancels the scheduler tick, health loop, and event router.
    pub background_cancel: CancellationToken,
}

impl DaemonState {
    pub(crate) fn new(
        config: Config,
        lock_file: File,
        ctx: Arc<HubCtx>,
        background_cancel: CancellationToken,
    ) -> Self {
        Self { config, lock_file, ctx, background_cancel }
    }

    /// Orderly teardown: stop intake, cancel loops, stop children and
    /// proxies, flush state, release files.
    pub async fn shutdown(&self) {
        info!("shutting down daemon");

        // 1. Stop accepting and cancel background loops.
        self.ctx.accept_cancel.cancel();
        self.background_cancel.cancel();

        // 2. Tunnels first (they reference proxies and processes).
        self.ctx.tunnels.shutdown_all().await;

        // 3. Children with the remaining budget, then proxies.
        self.ctx.procs.shutdown_all(env::shutdown_timeout()).await;
        self.ctx.proxies.shutdown_all().await;

        // 4. In-flight handlers answer ERR CANCELLED.
        self.ctx.handlers_cancel.cancel();

        // 5. Flush state.
        let snapshot = crate::state::snapshot(&self.ctx.proxies, Default::default());
        if let Err(e) = crate::state::write_state(&self.config.state_path, &snapshot) {
            warn!(error = %e, "final state write failed");
        }
        self.ctx.scheduler.persist();

        // 6. Release the socket and pid files (lock drops with self).
        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!(error = %e, "failed to remove socket file");
            }
        }
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!(error = %e, "failed to remove pid file");
            }
        }

        info!("daemon shutdown complete");
    }
}

/// Lifecycle errors.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine state directory")]
    NoStateDir,

    #[error("daemon already running")]
    AlreadyRunning,

    #[error("failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl LifecycleError {
    /// Process exit code for the failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            LifecycleError::AlreadyRunning => 3,
            _ => 10,
        }
    }
}
