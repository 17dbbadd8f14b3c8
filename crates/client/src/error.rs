// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client-side errors and their process exit codes.

use agnt_core::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("daemon not running")]
    NotRunning,

    #[error("daemon failed to start: {0}")]
    AutoStartFailed(String),

    #[error("protocol version mismatch: {0}")]
    VersionMismatch(String),

    #[error("request cancelled: connection lost")]
    Cancelled,

    #[error("daemon error: {kind} {message}")]
    Daemon { kind: ErrorKind, message: String },

    #[error("wire: {0}")]
    Wire(#[from] agnt_wire::WireError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// CLI process exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            ClientError::NotRunning => 4,
            ClientError::AutoStartFailed(_) => 4,
            ClientError::VersionMismatch(_) => 5,
            ClientError::Daemon { kind: ErrorKind::Usage, .. } => 2,
            _ => 10,
        }
    }

    pub fn is_not_running(&self) -> bool {
        matches!(self, ClientError::NotRunning | ClientError::AutoStartFailed(_))
    }
}
