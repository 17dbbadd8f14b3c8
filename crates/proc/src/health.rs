// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic liveness poll over the process registry.
//!
//! The supervisor task notices exits through `child.wait()`; this loop is
//! the backstop for a wait that never returns (e.g. a pid recycled under
//! us). A failed probe gets the group a SIGKILL so the waiter unsticks
//! and the normal restart/terminal path runs.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::manager::{ListFilter, ProcessManager};
use crate::platform;
use crate::HEALTH_CHECK_PERIOD;

pub struct HealthMonitor;

impl HealthMonitor {
    /// Spawn the poll loop. Pass `None` for the default period; tests use
    /// short periods or skip spawning entirely.
    pub fn spawn(
        manager: Arc<ProcessManager>,
        period: Option<Duration>,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let period = period.unwrap_or(HEALTH_CHECK_PERIOD);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    () = cancel.cancelled() => return,
                }
                Self::sweep(&manager);
            }
        })
    }

    fn sweep(manager: &ProcessManager) {
        for entry in manager.list(&ListFilter { project_path: None, global: true }) {
            let Ok(process) = manager.get(&entry.process_id) else { continue };
            if !process.probe_liveness() {
                warn!(id = %entry.process_id, "liveness probe failed, kicking group");
                if let Some(pgid) = process.pgid() {
                    let _ = platform::kill_group(pgid, platform::SIGKILL);
                }
            }
        }
        // Corpses detached from any client age out after an hour.
        manager.gc_aged(Duration::from_secs(3600));
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
