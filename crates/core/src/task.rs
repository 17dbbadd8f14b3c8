// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduled tasks: deferred messages to a session.
//!
//! State is monotonic (`Pending -> Delivered | Failed | Cancelled`) except
//! for the `Failed -> Pending` edge taken on retry.

use crate::define_id;
use serde::{Deserialize, Serialize};

define_id! {
    /// Scheduled task identifier.
    pub struct TaskId("tsk-");
}

/// Retry budget before a task is abandoned.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// Backoff before each retry attempt (1-indexed by attempt count).
pub const RETRY_BACKOFF_MS: [u64; 3] = [1_000, 5_000, 30_000];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Delivered,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Delivered | TaskState::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Delivered => "delivered",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
        }
    }
}

/// A deferred message owned by the scheduler.
///
/// Holds only the session code (weak reference): delivery fails when the
/// session is gone by firing time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub session_code: String,
    pub message: String,
    pub deliver_at_ms: u64,
    pub state: TaskState,
    pub attempts: u32,
    pub created_at_ms: u64,
}

impl ScheduledTask {
    pub fn new(
        session_code: impl Into<String>,
        message: impl Into<String>,
        deliver_at_ms: u64,
        created_at_ms: u64,
    ) -> Self {
        Self {
            id: TaskId::new(),
            session_code: session_code.into(),
            message: message.into(),
            deliver_at_ms,
            state: TaskState::Pending,
            attempts: 0,
            created_at_ms,
        }
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        self.state == TaskState::Pending && self.deliver_at_ms <= now_ms
    }

    /// Record a failed delivery attempt. Returns the next retry delay, or
    /// None when the budget is exhausted and the task stays `Failed`.
    pub fn record_failure(&mut self, now_ms: u64) -> Option<u64> {
        self.attempts += 1;
        if self.attempts >= MAX_DELIVERY_ATTEMPTS {
            self.state = TaskState::Failed;
            return None;
        }
        // Failed -> Pending: the one sanctioned backward edge.
        self.state = TaskState::Pending;
        let backoff = RETRY_BACKOFF_MS[(self.attempts as usize - 1).min(RETRY_BACKOFF_MS.len() - 1)];
        self.deliver_at_ms = now_ms + backoff;
        Some(backoff)
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
