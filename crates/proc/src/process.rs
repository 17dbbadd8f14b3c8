// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One supervised process: state machine, supervisor task, stop profiles.
//!
//! The supervisor task owns the `Child` and loops spawn -> wait -> decide.
//! All other parties interact through the atomic state cell, the ring
//! buffers, and a watch channel carrying the latest exit info.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use agnt_core::{
    Clock, ProcState, RestartPolicy, RestartWindow, RingBuffer, RingRead, StateCell,
    SystemClock, TransitionError,
};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::pidtrack::PidTracker;
use crate::platform;
use crate::spawn::{spawn_child, SpawnSpec};
use crate::{GRACEFUL_TIMEOUT, IMMEDIATE_THRESHOLD};

/// How a stop should treat the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopProfile {
    /// Termination signal, wait [`GRACEFUL_TIMEOUT`], then kill.
    Graceful,
    /// Kill at once; used when the shutdown budget is nearly spent.
    Immediate,
}

impl StopProfile {
    /// Pick a profile from the remaining shutdown budget.
    pub fn for_deadline(remaining: Duration) -> Self {
        if remaining < IMMEDIATE_THRESHOLD {
            StopProfile::Immediate
        } else {
            StopProfile::Graceful
        }
    }
}

/// Exit record published on the watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub success: bool,
    pub at_ms: u64,
}

/// Which ring buffer to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stdout" => Some(OutputStream::Stdout),
            "stderr" => Some(OutputStream::Stderr),
            _ => None,
        }
    }
}

/// A registered process and its supervisor state.
pub struct ManagedProcess {
    pub spec: SpawnSpec,
    state: StateCell<ProcState>,
    stdout: Arc<RingBuffer>,
    stderr: Arc<RingBuffer>,
    pid: Mutex<Option<(u32, Option<u32>)>>,
    labels: Mutex<HashMap<String, String>>,
    restarts: RestartWindow,
    exit_tx: watch::Sender<Option<ExitInfo>>,
    cancel: CancellationToken,
    tracker: Arc<PidTracker>,
    started_at_ms: Mutex<Option<u64>>,
    failed_tx: Mutex<Option<tokio::sync::mpsc::UnboundedSender<String>>>,
}

impl ManagedProcess {
    pub fn new(spec: SpawnSpec, tracker: Arc<PidTracker>) -> Self {
        let labels = Mutex::new(spec.labels.clone());
        let (exit_tx, _) = watch::channel(None);
        Self {
            spec,
            state: StateCell::new(ProcState::Created),
            stdout: Arc::new(RingBuffer::with_default_capacity()),
            stderr: Arc::new(RingBuffer::with_default_capacity()),
            pid: Mutex::new(None),
            labels,
            restarts: RestartWindow::default(),
            exit_tx,
            cancel: CancellationToken::new(),
            tracker,
            started_at_ms: Mutex::new(None),
            failed_tx: Mutex::new(None),
        }
    }

    /// Install a sink for permanent-failure notices (`proc_failed`).
    pub fn set_failure_notifier(&self, tx: tokio::sync::mpsc::UnboundedSender<String>) {
        *self.failed_tx.lock() = Some(tx);
    }

    fn notify_failed(&self) {
        if let Some(tx) = self.failed_tx.lock().as_ref() {
            let _ = tx.send(self.id().to_string());
        }
    }

    pub fn id(&self) -> &str {
        &self.spec.process_id
    }

    pub fn state(&self) -> ProcState {
        self.state.get()
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid.lock().map(|(pid, _)| pid)
    }

    pub fn pgid(&self) -> Option<u32> {
        self.pid.lock().and_then(|(_, pgid)| pgid)
    }

    pub fn started_at_ms(&self) -> Option<u64> {
        *self.started_at_ms.lock()
    }

    pub fn last_exit(&self) -> Option<ExitInfo> {
        *self.exit_tx.borrow()
    }

    pub fn labels(&self) -> HashMap<String, String> {
        self.labels.lock().clone()
    }

    pub fn set_labels(&self, labels: HashMap<String, String>) {
        *self.labels.lock() = labels;
    }

    /// Read captured output from the given stream.
    pub fn read_output(&self, stream: OutputStream, offset: u64, ack: bool) -> RingRead {
        let ring = match stream {
            OutputStream::Stdout => &self.stdout,
            OutputStream::Stderr => &self.stderr,
        };
        let read = ring.read_since(offset);
        if ack {
            ring.ack_truncation();
        }
        read
    }

    /// Start the supervisor. Fails when the process already left `Created`.
    pub fn start(self: &Arc<Self>) -> Result<(), TransitionError> {
        self.state.transition(ProcState::Created, ProcState::Starting)?;
        let this = Arc::clone(self);
        tokio::spawn(async move { this.supervise().await });
        Ok(())
    }

    /// spawn -> wait -> restart/terminal loop. Entered in `Starting`.
    async fn supervise(self: Arc<Self>) {
        let clock = SystemClock;
        loop {
            let mut spawned =
                match spawn_child(&self.spec, Arc::clone(&self.stdout), Arc::clone(&self.stderr)) {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(id = %self.id(), error = %e, "spawn failed");
                        let _ = self.state.transition(ProcState::Starting, ProcState::Failed);
                        self.notify_failed();
                        return;
                    }
                };

            *self.pid.lock() = Some((spawned.pid, spawned.pgid));
            *self.started_at_ms.lock() = Some(clock.epoch_ms());
            self.tracker.record(self.id(), spawned.pid, spawned.pgid);

            if self.state.transition(ProcState::Starting, ProcState::Running).is_err() {
                // Stop raced the spawn; tear the child back down.
                let _ = spawned.child.start_kill();
                let status = spawned.child.wait().await;
                self.tracker.remove(self.id());
                *self.pid.lock() = None;
                let _ = self.exit_tx.send(Some(ExitInfo {
                    code: status.as_ref().ok().and_then(|s| s.code()),
                    success: false,
                    at_ms: clock.epoch_ms(),
                }));
                return;
            }
            info!(id = %self.id(), pid = spawned.pid, "process running");

            let status = tokio::select! {
                status = spawned.child.wait() => status,
                () = self.cancel.cancelled() => {
                    // Owner teardown: the stop path already signalled the
                    // group; just collect the child.
                    spawned.child.wait().await
                }
            };

            self.tracker.remove(self.id());
            *self.pid.lock() = None;

            let exit = ExitInfo {
                code: status.as_ref().ok().and_then(|s| s.code()),
                success: status.as_ref().map(|s| s.success()).unwrap_or(false),
                at_ms: clock.epoch_ms(),
            };
            let _ = self.exit_tx.send(Some(exit));

            match self.state.get() {
                ProcState::Stopping => {
                    let _ = self.state.transition(ProcState::Stopping, ProcState::Stopped);
                    info!(id = %self.id(), "process stopped");
                    return;
                }
                ProcState::Running => {
                    if self.spec.restart.should_restart(exit.success) {
                        if self.restarts.record(clock.now()) {
                            info!(id = %self.id(), "restarting process");
                            if self.state.transition(ProcState::Running, ProcState::Restarting).is_err()
                                || self.state.transition(ProcState::Restarting, ProcState::Starting).is_err()
                            {
                                return;
                            }
                            continue;
                        }
                        warn!(id = %self.id(), "restart rate ceiling hit, failing permanently");
                        let _ = self.state.transition(ProcState::Running, ProcState::Failed);
                        self.notify_failed();
                        return;
                    }
                    // Died on its own with no restart due.
                    if exit.success {
                        let _ = self.state.transition(ProcState::Running, ProcState::Stopping);
                        let _ = self.state.transition(ProcState::Stopping, ProcState::Stopped);
                    } else {
                        let _ = self.state.transition(ProcState::Running, ProcState::Failed);
                        self.notify_failed();
                    }
                    return;
                }
                other => {
                    warn!(id = %self.id(), state = %other, "unexpected state after exit");
                    return;
                }
            }
        }
    }

    /// Stop the process with the given profile.
    ///
    /// Idempotent on terminal states. Fails with a race error when another
    /// stopper is already in flight.
    pub async fn stop(&self, profile: StopProfile) -> Result<(), TransitionError> {
        // Subscribe before transitioning so an exit landing mid-stop is
        // still observed as a change.
        let mut exit_rx = self.exit_tx.subscribe();

        match self.state.get() {
            ProcState::Stopped | ProcState::Failed => return Ok(()),
            ProcState::Created => {
                // Never started; nothing to signal.
                return Ok(());
            }
            _ => {}
        }

        // Starting/Restarting are brief; let the supervisor settle so the
        // Running -> Stopping edge is available.
        for _ in 0..200 {
            if !matches!(self.state.get(), ProcState::Starting | ProcState::Restarting) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        match self.state.get() {
            ProcState::Stopped | ProcState::Failed => return Ok(()),
            _ => {}
        }
        self.state.transition(ProcState::Running, ProcState::Stopping)?;

        match profile {
            StopProfile::Immediate => {
                self.signal_child(platform::SIGKILL);
                let _ = tokio::time::timeout(GRACEFUL_TIMEOUT, exit_rx.changed()).await;
            }
            StopProfile::Graceful => {
                self.signal_child(platform::SIGTERM);
                if tokio::time::timeout(GRACEFUL_TIMEOUT, exit_rx.changed()).await.is_err() {
                    warn!(id = %self.id(), "graceful timeout, killing group");
                    self.signal_child(platform::SIGKILL);
                    let _ = tokio::time::timeout(GRACEFUL_TIMEOUT, exit_rx.changed()).await;
                }
            }
        }
        Ok(())
    }

    /// Send a named signal to the process group.
    pub fn signal(&self, signum: i32) -> std::io::Result<()> {
        let Some((pid, pgid)) = *self.pid.lock() else {
            return Err(std::io::Error::other("process not running"));
        };
        match pgid {
            Some(pgid) => platform::kill_group(pgid, signum),
            None => platform::kill_pid(pid, signum),
        }
    }

    fn signal_child(&self, signum: i32) {
        if let Err(e) = self.signal(signum) {
            warn!(id = %self.id(), error = %e, "signal failed");
        }
    }

    /// Liveness probe for the health loop: force the death path when the
    /// OS pid vanished but the supervisor has not noticed an exit yet.
    pub fn probe_liveness(&self) -> bool {
        if self.state.get() != ProcState::Running {
            return true;
        }
        match self.pid() {
            Some(pid) => platform::pid_alive(pid),
            None => true,
        }
    }

    /// Cancellation token handed to the owner for teardown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
