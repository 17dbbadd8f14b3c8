// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize};
use std::sync::Arc;
use std::time::Instant;

use agnt_core::SystemClock;
use agnt_proc::{HealthMonitor, PidTracker, ProcessManager};
use agnt_proxy::ProxyManager;
use fs2::FileExt;
use tokio::net::UnixListener;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::env;
use crate::hub::subscribers::Subscribers;
use crate::hub::{spawn_event_router, spawn_proc_failure_router, Hub, HubCtx};
use crate::scheduler::Scheduler;
use crate::sessions::{DeliverySink, SessionStore};
use crate::state::{load_state, spawn_saver};
use crate::tunnel::TunnelSupervisor;

use super::{Config, DaemonState, LifecycleError};

/// Everything `main` needs after a successful startup.
#[derive(Debug)]
pub struct StartupResult {
    pub daemon: DaemonState,
    pub hub: Hub,
    /// Fired by the state saver after repeated write failures (fatal).
    pub fatal: Arc<Notify>,
}

/// Start the daemon.
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config).await {
        Ok(result) => Ok(result),
        Err(e) => {
            // Leave files alone when another daemon owns them.
            if !matches!(e, LifecycleError::AlreadyRunning) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config) -> Result<StartupResult, LifecycleError> {
    // 1. State directory first; everything else lives under it.
    std::fs::create_dir_all(&config.state_dir)?;

    // 2. Exclusive lock before touching shared files. Avoid truncating
    // before the lock is held, or we would wipe a running daemon's pid.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(|_| LifecycleError::AlreadyRunning)?;

    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // 3. Claim the socket: refuse when a live listener owns it, remove a
    // stale file nobody answers on.
    if config.socket_path.exists() {
        match tokio::net::UnixStream::connect(&config.socket_path).await {
            Ok(_) => return Err(LifecycleError::AlreadyRunning),
            Err(_) => {
                info!(path = %config.socket_path.display(), "removing stale socket");
                std::fs::remove_file(&config.socket_path)?;
            }
        }
    }

    // 4. Load the snapshot (may be quarantined to None).
    let snapshot = load_state(&config.state_path);
    if let Some(ref state) = snapshot {
        info!(proxies = state.proxies.len(), "loaded state snapshot");
    } else {
        info!("no usable state snapshot, starting fresh");
    }

    // 5. Process manager + orphan reap before anything spawns.
    let tracker = Arc::new(PidTracker::load(&config.pidtracker_path));
    let recorded = tracker.recorded().len();
    let procs = Arc::new(ProcessManager::new(tracker));
    let proc_failures = procs.failure_events();
    let reaped = procs.reap_orphans();
    if recorded > 0 {
        info!(recorded, reaped, "orphan reap complete");
    }

    // 6. Bind the socket (after all validation).
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;
    restrict_socket_mode(&config.socket_path);

    // 7. Wire the registries together.
    let (proxies, proxy_events) = ProxyManager::new();
    let proxies = Arc::new(proxies);
    let subscribers = Arc::new(Subscribers::new());
    let sessions = Arc::new(SessionStore::new(
        Arc::clone(&subscribers) as Arc<dyn DeliverySink>
    ));
    let scheduler = Arc::new(Scheduler::load(
        config.scheduler_path.clone(),
        Arc::clone(&sessions),
        SystemClock,
    ));
    let tunnels =
        Arc::new(TunnelSupervisor::new(Arc::clone(&procs), Arc::clone(&proxies)));

    let fatal = Arc::new(Notify::new());
    let saver =
        spawn_saver(config.state_path.clone(), Arc::clone(&proxies), Arc::clone(&fatal));

    // 8. Rebuild persisted proxies whose targets still answer.
    if let Some(state) = snapshot {
        let (restored, dropped) = proxies.rebuild(state.proxies).await;
        if restored + dropped > 0 {
            info!(restored, dropped, "proxy rebuild complete");
        }
    }

    // 9. Background loops.
    let background_cancel = CancellationToken::new();
    scheduler.spawn_loop(background_cancel.clone());
    if let Some(period) = env::health_check_period() {
        HealthMonitor::spawn(Arc::clone(&procs), Some(period), background_cancel.clone());
    }
    spawn_event_router(proxy_events, Arc::clone(&subscribers), background_cancel.clone());
    spawn_proc_failure_router(proc_failures, Arc::clone(&subscribers), background_cancel.clone());

    let ctx = Arc::new(HubCtx {
        config: config.clone(),
        procs,
        proxies,
        sessions,
        scheduler,
        tunnels,
        saver,
        subscribers,
        shutdown: Arc::new(Notify::new()),
        upgrading: AtomicBool::new(false),
        accept_cancel: CancellationToken::new(),
        handlers_cancel: CancellationToken::new(),
        inflight: AtomicUsize::new(0),
        start_time: Instant::now(),
    });

    let hub = Hub::new(listener, Arc::clone(&ctx));
    info!("daemon started");

    Ok(StartupResult {
        daemon: DaemonState::new(config.clone(), lock_file, ctx, background_cancel),
        hub,
        fatal,
    })
}

/// User-only permissions on the socket.
#[cfg(unix)]
fn restrict_socket_mode(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        warn!(error = %e, "failed to restrict socket permissions");
    }
}

#[cfg(not(unix))]
fn restrict_socket_mode(_path: &std::path::Path) {}

/// Clean up resources on startup failure.
fn cleanup_on_failure(config: &Config) {
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
