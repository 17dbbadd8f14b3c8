// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process and proxy state machines.
//!
//! Transitions are compare-and-swap on a single atomic word so that no
//! observer ever sees both the pre- and post-state as current, and a
//! concurrent attempt to leave the same state loses with a race error.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

/// Restart rate ceiling: more than this many restarts inside
/// [`RESTART_WINDOW`] transitions the entity to permanent `Failed`.
pub const MAX_RESTARTS_PER_WINDOW: usize = 5;
pub const RESTART_WINDOW: Duration = Duration::from_secs(60);

/// Enum storable in a [`StateCell`].
pub trait StateEnum: Copy + Eq + fmt::Debug + Send + Sync {
    fn as_word(self) -> u8;
    fn from_word(word: u8) -> Self;
    /// Whether the machine permits `from -> to`.
    fn permits(from: Self, to: Self) -> bool;
}

/// Managed process state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcState {
    Created,
    Starting,
    Running,
    Restarting,
    Stopping,
    Stopped,
    Failed,
}

impl ProcState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcState::Stopped | ProcState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProcState::Created => "created",
            ProcState::Starting => "starting",
            ProcState::Running => "running",
            ProcState::Restarting => "restarting",
            ProcState::Stopping => "stopping",
            ProcState::Stopped => "stopped",
            ProcState::Failed => "failed",
        }
    }
}

impl fmt::Display for ProcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StateEnum for ProcState {
    fn as_word(self) -> u8 {
        match self {
            ProcState::Created => 0,
            ProcState::Starting => 1,
            ProcState::Running => 2,
            ProcState::Restarting => 3,
            ProcState::Stopping => 4,
            ProcState::Stopped => 5,
            ProcState::Failed => 6,
        }
    }

    fn from_word(word: u8) -> Self {
        match word {
            0 => ProcState::Created,
            1 => ProcState::Starting,
            2 => ProcState::Running,
            3 => ProcState::Restarting,
            4 => ProcState::Stopping,
            5 => ProcState::Stopped,
            _ => ProcState::Failed,
        }
    }

    fn permits(from: Self, to: Self) -> bool {
        use ProcState::*;
        matches!(
            (from, to),
            (Created, Starting)
                | (Starting, Running)
                | (Starting, Failed)
                | (Running, Stopping)
                | (Running, Restarting)
                | (Running, Failed)
                | (Restarting, Starting)
                | (Restarting, Failed)
                | (Stopping, Stopped)
                | (Stopping, Failed)
        )
    }
}

/// Reverse proxy instance state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyState {
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl ProxyState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProxyState::Stopped | ProxyState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProxyState::Starting => "starting",
            ProxyState::Running => "running",
            ProxyState::Stopping => "stopping",
            ProxyState::Stopped => "stopped",
            ProxyState::Failed => "failed",
        }
    }
}

impl fmt::Display for ProxyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StateEnum for ProxyState {
    fn as_word(self) -> u8 {
        match self {
            ProxyState::Starting => 0,
            ProxyState::Running => 1,
            ProxyState::Stopping => 2,
            ProxyState::Stopped => 3,
            ProxyState::Failed => 4,
        }
    }

    fn from_word(word: u8) -> Self {
        match word {
            0 => ProxyState::Starting,
            1 => ProxyState::Running,
            2 => ProxyState::Stopping,
            3 => ProxyState::Stopped,
            _ => ProxyState::Failed,
        }
    }

    fn permits(from: Self, to: Self) -> bool {
        use ProxyState::*;
        matches!(
            (from, to),
            (Starting, Running)
                | (Starting, Failed)
                | (Starting, Stopping)
                | (Running, Stopping)
                | (Running, Failed)
                | (Stopping, Stopped)
                | (Stopping, Failed)
        )
    }
}

/// Failed state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// Another task changed the state first.
    #[error("state changed concurrently")]
    Raced,
    /// The machine does not permit this edge.
    #[error("transition not permitted")]
    NotPermitted,
}

/// Atomic state word with CAS transitions.
pub struct StateCell<S: StateEnum> {
    word: AtomicU8,
    _marker: PhantomData<S>,
}

impl<S: StateEnum> StateCell<S> {
    pub fn new(initial: S) -> Self {
        Self { word: AtomicU8::new(initial.as_word()), _marker: PhantomData }
    }

    pub fn get(&self) -> S {
        S::from_word(self.word.load(Ordering::SeqCst))
    }

    /// Attempt `from -> to`. Fails with [`TransitionError::Raced`] when the
    /// current state is no longer `from`, and [`TransitionError::NotPermitted`]
    /// when the edge is not in the machine.
    pub fn transition(&self, from: S, to: S) -> Result<(), TransitionError> {
        if !S::permits(from, to) {
            return Err(TransitionError::NotPermitted);
        }
        self.word
            .compare_exchange(from.as_word(), to.as_word(), Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| TransitionError::Raced)
    }

    /// Attempt to move to `to` from whatever the current state is, if the
    /// edge is permitted. Returns the prior state on success.
    pub fn transition_from_current(&self, to: S) -> Result<S, TransitionError> {
        loop {
            let current = self.get();
            if !S::permits(current, to) {
                return Err(TransitionError::NotPermitted);
            }
            match self.transition(current, to) {
                Ok(()) => return Ok(current),
                Err(TransitionError::Raced) => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

impl<S: StateEnum> fmt::Debug for StateCell<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateCell({:?})", self.get())
    }
}

/// Restart policy for managed processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    #[default]
    Never,
    OnFailure,
    Always,
}

impl RestartPolicy {
    pub fn should_restart(self, exit_ok: bool) -> bool {
        match self {
            RestartPolicy::Never => false,
            RestartPolicy::OnFailure => !exit_ok,
            RestartPolicy::Always => true,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "never" => Some(RestartPolicy::Never),
            "on-failure" => Some(RestartPolicy::OnFailure),
            "always" => Some(RestartPolicy::Always),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RestartPolicy::Never => "never",
            RestartPolicy::OnFailure => "on-failure",
            RestartPolicy::Always => "always",
        }
    }
}

/// Sliding-window restart counter.
///
/// `record` returns false once the ceiling is exceeded; the caller then
/// pins the entity in `Failed`.
pub struct RestartWindow {
    window: Duration,
    limit: usize,
    marks: Mutex<VecDeque<Instant>>,
}

impl RestartWindow {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self { window, limit, marks: Mutex::new(VecDeque::new()) }
    }

    pub fn record(&self, now: Instant) -> bool {
        let mut marks = self.marks.lock();
        while let Some(front) = marks.front() {
            if now.duration_since(*front) > self.window {
                marks.pop_front();
            } else {
                break;
            }
        }
        if marks.len() >= self.limit {
            return false;
        }
        marks.push_back(now);
        true
    }
}

impl Default for RestartWindow {
    fn default() -> Self {
        Self::new(MAX_RESTARTS_PER_WINDOW, RESTART_WINDOW)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
