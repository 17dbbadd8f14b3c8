// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! agnt-proc: supervised child processes.
//!
//! Spawns children as process-group leaders, mirrors their output into
//! bounded ring buffers, drives the restart state machine, and reaps
//! orphans left behind by a previous daemon via the on-disk PID tracker.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod health;
pub mod manager;
pub mod pidtrack;
pub mod platform;
pub mod process;
pub mod spawn;

pub use health::HealthMonitor;
pub use manager::{ListFilter, ProcEntry, ProcError, ProcessManager};
pub use pidtrack::{PidRecord, PidTracker};
pub use process::{ExitInfo, ManagedProcess, OutputStream, StopProfile};
pub use spawn::SpawnSpec;

/// Graceful stop: signal, then wait this long before killing.
pub const GRACEFUL_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Below this remaining shutdown budget, skip straight to kill.
pub const IMMEDIATE_THRESHOLD: std::time::Duration = std::time::Duration::from_secs(3);

/// Default liveness poll period.
pub const HEALTH_CHECK_PERIOD: std::time::Duration = std::time::Duration::from_secs(10);
