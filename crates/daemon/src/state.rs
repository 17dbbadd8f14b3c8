// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon state snapshot: `state.json`.
//!
//! A single schema-versioned JSON file holding the proxy records and
//! daemon-level settings. Writes funnel through one saver task so callers
//! enqueue and continue; three consecutive write failures are fatal to
//! the daemon.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use agnt_proxy::{ProxyManager, ProxyRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Notify};
use tracing::{error, info, warn};

pub const STATE_SCHEMA_VERSION: u32 = 1;

const MAX_CONSECUTIVE_WRITE_FAILURES: u32 = 3;

/// The persisted snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(rename = "v")]
    pub version: u32,
    #[serde(default)]
    pub proxies: Vec<ProxyRecord>,
    #[serde(default)]
    pub settings: HashMap<String, String>,
    /// When this snapshot was written.
    #[serde(default)]
    pub written_at: Option<DateTime<Utc>>,
}

/// Load the snapshot; corrupt or unknown-version files are quarantined
/// and `None` is returned so a fresh snapshot gets written.
pub fn load_state(path: &Path) -> Option<StateFile> {
    let bytes = std::fs::read(path).ok()?;
    match serde_json::from_slice::<StateFile>(&bytes) {
        Ok(state) if state.version == STATE_SCHEMA_VERSION => Some(state),
        Ok(state) => {
            warn!(version = state.version, "unknown state schema, quarantining");
            quarantine(path);
            None
        }
        Err(e) => {
            warn!(error = %e, "corrupt state file, quarantining");
            quarantine(path);
            None
        }
    }
}

fn quarantine(path: &Path) {
    let _ = std::fs::rename(path, path.with_extension("json.corrupt"));
}

/// Write the snapshot atomically (temp + rename).
pub fn write_state(path: &Path, state: &StateFile) -> std::io::Result<()> {
    let json = serde_json::to_vec_pretty(state).map_err(std::io::Error::other)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json)?;
    std::fs::rename(&tmp, path)
}

/// Gather the current snapshot from the live registries.
pub fn snapshot(proxies: &ProxyManager, settings: HashMap<String, String>) -> StateFile {
    StateFile {
        version: STATE_SCHEMA_VERSION,
        proxies: proxies.records(),
        settings,
        written_at: Some(Utc::now()),
    }
}

/// Handle for enqueueing save requests.
#[derive(Clone)]
pub struct StateSaver {
    tx: mpsc::Sender<()>,
}

impl StateSaver {
    /// Request a snapshot write; coalesces with pending requests.
    pub fn request_save(&self) {
        let _ = self.tx.try_send(());
    }
}

/// Spawn the single-writer save task. `fatal` is notified after
/// [`MAX_CONSECUTIVE_WRITE_FAILURES`] straight failures.
pub fn spawn_saver(
    path: PathBuf,
    proxies: Arc<ProxyManager>,
    fatal: Arc<Notify>,
) -> StateSaver {
    let (tx, mut rx) = mpsc::channel::<()>(8);
    tokio::spawn(async move {
        let mut failures = 0u32;
        while rx.recv().await.is_some() {
            // Coalesce a burst of requests into one write.
            while rx.try_recv().is_ok() {}

            let state = snapshot(&proxies, HashMap::new());
            match write_state(&path, &state) {
                Ok(()) => {
                    failures = 0;
                    info!(proxies = state.proxies.len(), "state snapshot written");
                }
                Err(e) => {
                    failures += 1;
                    warn!(error = %e, failures, "state snapshot write failed");
                    if failures >= MAX_CONSECUTIVE_WRITE_FAILURES {
                        error!("state persistence failing repeatedly, shutting down");
                        fatal.notify_one();
                        return;
                    }
                }
            }
        }
    });
    StateSaver { tx }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
