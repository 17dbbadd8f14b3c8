// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named sessions: short-code-addressable conduits to a tool-server
//! adapter's delivery queue.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    Closed,
}

/// A named session record. Delivery channels live in the daemon's store,
/// not here; this is the persisted/displayed shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Short human-readable code, unique per user.
    pub code: String,
    pub project_path: PathBuf,
    pub created_at_ms: u64,
    pub state: SessionState,
}

impl Session {
    pub fn new(code: impl Into<String>, project_path: PathBuf, created_at_ms: u64) -> Self {
        Self { code: code.into(), project_path, created_at_ms, state: SessionState::Active }
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
