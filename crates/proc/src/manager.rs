// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process registry: register, start, stop, list, output, signal, labels.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agnt_core::{Clock, ErrorKind, ProcState, RingRead};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::info;

use crate::pidtrack::PidTracker;
use crate::process::{ManagedProcess, OutputStream, StopProfile};
use crate::spawn::SpawnSpec;

/// Manager-level errors, each mapping onto a wire kind.
#[derive(Debug, Error)]
pub enum ProcError {
    #[error("process already exists: {0}")]
    Exists(String),

    #[error("no such process: {0}")]
    NotFound(String),

    #[error("manager is shutting down")]
    ShuttingDown,

    #[error("invalid state for {id}: {state}")]
    InvalidState { id: String, state: ProcState },

    #[error("lost a state race on {0}")]
    Raced(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcError::Exists(_) => ErrorKind::AlreadyExists,
            ProcError::NotFound(_) => ErrorKind::NotFound,
            ProcError::ShuttingDown => ErrorKind::InvalidState,
            ProcError::InvalidState { .. } => ErrorKind::InvalidState,
            ProcError::Raced(_) => ErrorKind::RaceTransition,
            ProcError::Io(_) => ErrorKind::Internal,
        }
    }
}

/// Listing filter: by project path unless global.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub project_path: Option<PathBuf>,
    pub global: bool,
}

/// Summary row returned by `list`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProcEntry {
    pub process_id: String,
    pub state: ProcState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub command: String,
    pub project_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

/// Registry of managed processes, keyed by client-supplied id.
pub struct ProcessManager {
    procs: RwLock<HashMap<String, Arc<ManagedProcess>>>,
    tracker: Arc<PidTracker>,
    shutting_down: AtomicBool,
    failed_tx: parking_lot::Mutex<Option<tokio::sync::mpsc::UnboundedSender<String>>>,
}

impl ProcessManager {
    pub fn new(tracker: Arc<PidTracker>) -> Self {
        Self {
            procs: RwLock::new(HashMap::new()),
            tracker,
            shutting_down: AtomicBool::new(false),
            failed_tx: parking_lot::Mutex::new(None),
        }
    }

    /// Receiver of process ids that failed permanently (`proc_failed`).
    /// Applies to processes registered after this call.
    pub fn failure_events(&self) -> tokio::sync::mpsc::UnboundedReceiver<String> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        *self.failed_tx.lock() = Some(tx);
        rx
    }

    pub fn tracker(&self) -> &Arc<PidTracker> {
        &self.tracker
    }

    /// Register a new process. Fails when the id is taken or teardown has
    /// begun.
    pub fn register(&self, spec: SpawnSpec) -> Result<Arc<ManagedProcess>, ProcError> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(ProcError::ShuttingDown);
        }
        let mut procs = self.procs.write();
        if procs.contains_key(&spec.process_id) {
            return Err(ProcError::Exists(spec.process_id));
        }
        let process = Arc::new(ManagedProcess::new(spec, Arc::clone(&self.tracker)));
        if let Some(tx) = self.failed_tx.lock().as_ref() {
            process.set_failure_notifier(tx.clone());
        }
        procs.insert(process.id().to_string(), Arc::clone(&process));
        Ok(process)
    }

    /// Register and immediately start.
    pub fn start(&self, spec: SpawnSpec) -> Result<Arc<ManagedProcess>, ProcError> {
        let process = self.register(spec)?;
        if process.start().is_err() {
            // Registration succeeded moments ago; only a concurrent starter
            // can race us here.
            return Err(ProcError::Raced(process.id().to_string()));
        }
        Ok(process)
    }

    pub fn get(&self, id: &str) -> Result<Arc<ManagedProcess>, ProcError> {
        self.procs.read().get(id).cloned().ok_or_else(|| ProcError::NotFound(id.to_string()))
    }

    /// Stop a process and drop its registration.
    pub async fn stop(&self, id: &str, profile: StopProfile) -> Result<(), ProcError> {
        let process = self.get(id)?;
        process
            .stop(profile)
            .await
            .map_err(|_| ProcError::Raced(id.to_string()))?;
        self.procs.write().remove(id);
        Ok(())
    }

    /// Drop terminal processes that died on their own.
    pub fn gc(&self) -> usize {
        let mut procs = self.procs.write();
        let before = procs.len();
        procs.retain(|_, p| !p.state().is_terminal());
        before - procs.len()
    }

    /// Drop terminal processes whose exit is older than `max_age`.
    ///
    /// Recent corpses stay visible so clients can still read their output.
    pub fn gc_aged(&self, max_age: Duration) -> usize {
        let now_ms = agnt_core::SystemClock.epoch_ms();
        let cutoff = max_age.as_millis() as u64;
        let mut procs = self.procs.write();
        let before = procs.len();
        procs.retain(|_, p| {
            let aged_out = p.state().is_terminal()
                && p.last_exit()
                    .map(|e| now_ms.saturating_sub(e.at_ms) > cutoff)
                    .unwrap_or(false);
            !aged_out
        });
        before - procs.len()
    }

    pub fn list(&self, filter: &ListFilter) -> Vec<ProcEntry> {
        let procs = self.procs.read();
        let mut entries: Vec<ProcEntry> = procs
            .values()
            .filter(|p| {
                filter.global
                    || filter
                        .project_path
                        .as_deref()
                        .map(|root| p.spec.project_path == root)
                        .unwrap_or(true)
            })
            .map(|p| ProcEntry {
                process_id: p.id().to_string(),
                state: p.state(),
                pid: p.pid(),
                command: p.spec.command.clone(),
                project_path: p.spec.project_path.clone(),
                started_at_ms: p.started_at_ms(),
                labels: p.labels(),
                exit_code: p.last_exit().and_then(|e| e.code),
            })
            .collect();
        entries.sort_by(|a, b| a.process_id.cmp(&b.process_id));
        entries
    }

    pub fn read_output(
        &self,
        id: &str,
        stream: OutputStream,
        offset: u64,
        ack: bool,
    ) -> Result<RingRead, ProcError> {
        Ok(self.get(id)?.read_output(stream, offset, ack))
    }

    pub fn signal(&self, id: &str, signum: i32) -> Result<(), ProcError> {
        self.get(id)?.signal(signum).map_err(ProcError::Io)
    }

    pub fn set_labels(&self, id: &str, labels: HashMap<String, String>) -> Result<(), ProcError> {
        self.get(id)?.set_labels(labels);
        Ok(())
    }

    /// Reap orphans recorded by a previous run. Call before any spawns.
    pub fn reap_orphans(&self) -> usize {
        let claimed: Vec<String> = self.procs.read().keys().cloned().collect();
        self.tracker.reap_orphans(&claimed)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Stop everything within `deadline`. New registrations fail fast once
    /// the flag flips.
    pub async fn shutdown_all(&self, deadline: Duration) {
        self.shutting_down.store(true, Ordering::SeqCst);
        let ids: Vec<String> = self.procs.read().keys().cloned().collect();
        if ids.is_empty() {
            return;
        }
        info!(count = ids.len(), "stopping managed processes");
        let profile = StopProfile::for_deadline(deadline);
        let mut handles = Vec::with_capacity(ids.len());
        for id in ids {
            if let Ok(process) = self.get(&id) {
                handles.push(tokio::spawn(async move {
                    let _ = process.stop(profile).await;
                }));
            }
        }
        for handle in handles {
            let _ = handle.await;
        }
        self.procs.write().clear();
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
