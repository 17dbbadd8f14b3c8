// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deferred message scheduler.
//!
//! A once-per-second tick fires tasks whose deliver-at has passed.
//! Delivery goes through the session store; failures retry on the
//! 1 s / 5 s / 30 s ladder before the task settles in `Failed`. Pending
//! tasks persist to `scheduler.json` and are replayed after downtime.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use agnt_core::{Clock, ScheduledTask, TaskState};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::sessions::SessionStore;

/// Tick period.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

const SCHEDULER_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no such task: {0}")]
    NotFound(String),

    #[error("task already {0}")]
    Terminal(&'static str),
}

#[derive(Debug, Serialize, Deserialize)]
struct SchedulerFile {
    #[serde(rename = "v")]
    version: u32,
    tasks: Vec<ScheduledTask>,
}

/// Task map plus persistence; generic over the clock for tests.
pub struct Scheduler<C: Clock> {
    clock: C,
    path: PathBuf,
    store: Arc<SessionStore>,
    tasks: Mutex<HashMap<String, ScheduledTask>>,
}

impl<C: Clock> Scheduler<C> {
    /// Load pending tasks from disk; corrupt or unknown-version files are
    /// quarantined and the scheduler starts empty.
    pub fn load(path: PathBuf, store: Arc<SessionStore>, clock: C) -> Self {
        let tasks = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<SchedulerFile>(&bytes) {
                Ok(file) if file.version == SCHEDULER_SCHEMA_VERSION => file
                    .tasks
                    .into_iter()
                    .filter(|t| t.state == TaskState::Pending)
                    .map(|t| (t.id.as_str().to_string(), t))
                    .collect(),
                Ok(file) => {
                    warn!(version = file.version, "unknown scheduler schema, quarantining");
                    quarantine(&path);
                    HashMap::new()
                }
                Err(e) => {
                    warn!(error = %e, "corrupt scheduler file, quarantining");
                    quarantine(&path);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        if !tasks.is_empty() {
            info!(count = tasks.len(), "rehydrated pending scheduled tasks");
        }
        Self { clock, path, store, tasks: Mutex::new(tasks) }
    }

    pub fn add(
        &self,
        session_code: &str,
        message: &str,
        deliver_at_ms: u64,
    ) -> ScheduledTask {
        let task =
            ScheduledTask::new(session_code, message, deliver_at_ms, self.clock.epoch_ms());
        self.tasks.lock().insert(task.id.as_str().to_string(), task.clone());
        self.persist();
        task
    }

    pub fn cancel(&self, task_id: &str) -> Result<(), SchedulerError> {
        {
            let mut tasks = self.tasks.lock();
            let task = tasks
                .get_mut(task_id)
                .ok_or_else(|| SchedulerError::NotFound(task_id.to_string()))?;
            match task.state {
                TaskState::Pending | TaskState::Failed => task.state = TaskState::Cancelled,
                TaskState::Delivered => return Err(SchedulerError::Terminal("delivered")),
                TaskState::Cancelled => return Err(SchedulerError::Terminal("cancelled")),
            }
        }
        self.persist();
        Ok(())
    }

    pub fn get(&self, task_id: &str) -> Option<ScheduledTask> {
        self.tasks.lock().get(task_id).cloned()
    }

    pub fn list(&self, session_code: Option<&str>) -> Vec<ScheduledTask> {
        let tasks = self.tasks.lock();
        let mut out: Vec<ScheduledTask> = tasks
            .values()
            .filter(|t| session_code.map(|c| t.session_code == c).unwrap_or(true))
            .cloned()
            .collect();
        out.sort_by_key(|t| t.deliver_at_ms);
        out
    }

    /// Fire everything due. Returns how many tasks reached a new state.
    pub fn tick(&self) -> usize {
        let now_ms = self.clock.epoch_ms();
        let due: Vec<(String, String, String)> = {
            let tasks = self.tasks.lock();
            tasks
                .values()
                .filter(|t| t.is_due(now_ms))
                .map(|t| {
                    (t.id.as_str().to_string(), t.session_code.clone(), t.message.clone())
                })
                .collect()
        };
        if due.is_empty() {
            return 0;
        }

        let mut changed = 0;
        for (id, session_code, message) in due {
            // Delivery happens outside the task lock; the session store
            // locks internally.
            let delivered = self.store.send(&session_code, &message).is_ok();

            let mut tasks = self.tasks.lock();
            let Some(task) = tasks.get_mut(&id) else { continue };
            if task.state != TaskState::Pending {
                // Cancelled while we were delivering; leave it be.
                continue;
            }
            if delivered {
                task.state = TaskState::Delivered;
                task.attempts += 1;
                info!(task = %task.id, session = %session_code, "scheduled message delivered");
            } else {
                match task.record_failure(now_ms) {
                    Some(backoff_ms) => {
                        warn!(task = %task.id, backoff_ms, "delivery failed, retrying");
                    }
                    None => {
                        warn!(task = %task.id, "delivery failed permanently");
                    }
                }
            }
            changed += 1;
        }
        self.persist();
        changed
    }

    /// Periodic tick loop.
    pub fn spawn_loop(self: &Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()>
    where
        C: 'static,
    {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TICK_PERIOD);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    () = cancel.cancelled() => return,
                }
                this.tick();
            }
        })
    }

    /// Persist pending tasks (temp + rename). Terminal tasks stay
    /// queryable in memory but do not survive a restart.
    pub fn persist(&self) {
        let pending: Vec<ScheduledTask> = self
            .tasks
            .lock()
            .values()
            .filter(|t| t.state == TaskState::Pending)
            .cloned()
            .collect();
        let file = SchedulerFile { version: SCHEDULER_SCHEMA_VERSION, tasks: pending };
        let json = match serde_json::to_vec_pretty(&file) {
            Ok(j) => j,
            Err(e) => {
                warn!(error = %e, "scheduler serialize failed");
                return;
            }
        };
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let tmp = self.path.with_extension("json.tmp");
        let result = std::fs::write(&tmp, &json).and_then(|()| std::fs::rename(&tmp, &self.path));
        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "scheduler write failed");
        }
    }
}

fn quarantine(path: &PathBuf) {
    let _ = std::fs::rename(path, path.with_extension("json.corrupt"));
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
