// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk PID tracker and orphan reaper.
//!
//! Every managed OS pid (and group id) is persisted so a daemon that died
//! uncleanly can find and terminate survivors on the next startup. Writes
//! are temp-and-rename; a corrupt file is quarantined and the tracker
//! continues with an empty set.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::platform;

/// One tracked pid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PidRecord {
    pub process_id: String,
    pub pid: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pgid: Option<u32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TrackerFile {
    #[serde(default)]
    pids: Vec<PidRecord>,
}

/// Persistent registry of managed OS pids.
pub struct PidTracker {
    path: PathBuf,
    entries: Mutex<HashMap<String, PidRecord>>,
}

impl PidTracker {
    /// Load the tracker, quarantining a corrupt file.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<TrackerFile>(&bytes) {
                Ok(file) => {
                    file.pids.into_iter().map(|r| (r.process_id.clone(), r)).collect()
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "corrupt pid tracker, quarantining");
                    let quarantine = path.with_extension("json.corrupt");
                    let _ = std::fs::rename(&path, quarantine);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self { path, entries: Mutex::new(entries) }
    }

    /// Pids recorded by a previous daemon run, before any new spawns.
    pub fn recorded(&self) -> Vec<PidRecord> {
        self.entries.lock().values().cloned().collect()
    }

    pub fn record(&self, process_id: &str, pid: u32, pgid: Option<u32>) {
        self.entries
            .lock()
            .insert(process_id.to_string(), PidRecord { process_id: process_id.to_string(), pid, pgid });
        self.save();
    }

    pub fn remove(&self, process_id: &str) {
        if self.entries.lock().remove(process_id).is_some() {
            self.save();
        }
    }

    /// Terminate recorded survivors not claimed by the current manager,
    /// then drop them from the file. Returns the number reaped.
    pub fn reap_orphans(&self, claimed: &[String]) -> usize {
        let orphans: Vec<PidRecord> = {
            let entries = self.entries.lock();
            entries
                .values()
                .filter(|r| !claimed.contains(&r.process_id))
                .cloned()
                .collect()
        };

        let mut reaped = 0;
        for orphan in &orphans {
            if platform::pid_alive(orphan.pid) {
                info!(
                    process_id = %orphan.process_id,
                    pid = orphan.pid,
                    "reaping orphaned process"
                );
                let result = match orphan.pgid {
                    Some(pgid) => platform::kill_group(pgid, platform::SIGKILL),
                    None => platform::kill_pid(orphan.pid, platform::SIGKILL),
                };
                if let Err(e) = result {
                    warn!(pid = orphan.pid, error = %e, "failed to reap orphan");
                } else {
                    reaped += 1;
                }
            }
            self.entries.lock().remove(&orphan.process_id);
        }
        if !orphans.is_empty() {
            self.save();
        }
        reaped
    }

    /// Write the file atomically (temp + rename).
    fn save(&self) {
        let file = TrackerFile { pids: self.entries.lock().values().cloned().collect() };
        let json = match serde_json::to_vec_pretty(&file) {
            Ok(j) => j,
            Err(e) => {
                warn!(error = %e, "pid tracker serialize failed");
                return;
            }
        };
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let tmp = self.path.with_extension("json.tmp");
        let result = std::fs::write(&tmp, &json).and_then(|()| std::fs::rename(&tmp, &self.path));
        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "pid tracker write failed");
        }
    }
}

#[cfg(test)]
#[path = "pidtrack_tests.rs"]
mod tests;
