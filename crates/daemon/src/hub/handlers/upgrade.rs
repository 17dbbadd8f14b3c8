// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `UPGRADE` — graceful in-place daemon restart.
//!
//! The first claimant wins; everyone else gets `INVALID_STATE`. The
//! winner stops the accept loop, waits for in-flight handlers to drain
//! (bounded), persists state, then execs the successor binary, which
//! re-binds the same socket path. Handlers still running at the deadline
//! answer `ERR CANCELLED` via the shared cancellation token.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use agnt_core::ErrorKind;
use agnt_wire::Reply;
use async_trait::async_trait;
use tracing::{error, info};

use super::{HandlerCtx, VerbHandler};
use crate::env::drain_timeout;
use crate::hub::HubCtx;

pub struct UpgradeHandler;

#[async_trait]
impl VerbHandler for UpgradeHandler {
    async fn handle(&self, ctx: HandlerCtx<'_>, _sub: Option<&str>, _args: &[String]) -> Reply {
        if ctx
            .hub
            .upgrading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Reply::err(ErrorKind::InvalidState, "upgrade already in progress");
        }

        info!("upgrade claimed, draining");
        let hub = Arc::clone(ctx.hub);
        tokio::spawn(async move { run_upgrade(hub).await });
        Reply::ok(vec!["upgrading".to_string()])
    }
}

async fn run_upgrade(hub: Arc<HubCtx>) {
    // 1. No new connections.
    hub.accept_cancel.cancel();

    // 2. Drain in-flight handlers; this task is not counted.
    let deadline = tokio::time::Instant::now() + drain_timeout();
    while hub.inflight.load(Ordering::SeqCst) > 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    // 3. Persist state synchronously.
    let snapshot = crate::state::snapshot(&hub.proxies, Default::default());
    if let Err(e) = crate::state::write_state(&hub.config.state_path, &snapshot) {
        error!(error = %e, "state write failed during upgrade");
    }
    hub.scheduler.persist();

    // 4. Anything still running answers ERR CANCELLED.
    hub.handlers_cancel.cancel();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // 5. Exec the successor; it re-binds the socket path.
    info!("execing successor binary");
    let _ = std::fs::remove_file(&hub.config.socket_path);
    exec_successor();
}

#[cfg(unix)]
fn exec_successor() {
    use std::os::unix::process::CommandExt;
    let Ok(exe) = std::env::current_exe() else {
        error!("cannot resolve current executable, shutting down instead");
        std::process::exit(10);
    };
    // File descriptors are CLOEXEC, so the socket and the lock release
    // across the exec boundary.
    let err = std::process::Command::new(exe).exec();
    error!(error = %err, "exec failed");
    std::process::exit(10);
}

#[cfg(not(unix))]
fn exec_successor() {
    error!("upgrade exec unsupported on this platform");
    std::process::exit(10);
}
