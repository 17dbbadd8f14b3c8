// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

/// Negotiated in the `HELLO` handshake.
pub const PROTOCOL_VERSION: &str = "1";

/// Per-user IPC socket path: `AGNT_SOCKET_PATH` >
/// `${TMPDIR}/devtool-mcp-${username}.sock`.
pub fn socket_path() -> PathBuf {
    if let Ok(path) = std::env::var("AGNT_SOCKET_PATH") {
        return PathBuf::from(path);
    }
    let tmp = std::env::var("TMPDIR").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(tmp).join(format!("devtool-mcp-{}.sock", username()))
}

/// Resolve state directory: `AGNT_STATE_DIR` > XDG state dir > ~/.local/state/agnt.
pub fn state_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("AGNT_STATE_DIR") {
        return Some(PathBuf::from(dir));
    }
    if let Some(dir) = dirs::state_dir() {
        return Some(dir.join("agnt"));
    }
    dirs::home_dir().map(|home| home.join(".local/state/agnt"))
}

fn username() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "user".to_string())
}

/// Per-message IPC read/write deadline.
pub fn ipc_timeout() -> Duration {
    ms_env("AGNT_IPC_TIMEOUT_MS", Duration::from_secs(5))
}

/// Verb handler deadline; handlers past it answer `ERR TIMEOUT`.
pub fn handler_timeout() -> Duration {
    ms_env("AGNT_HANDLER_TIMEOUT_MS", Duration::from_secs(30))
}

/// In-flight drain budget during upgrade and shutdown.
pub fn drain_timeout() -> Duration {
    ms_env("AGNT_DRAIN_TIMEOUT_MS", Duration::from_secs(5))
}

/// Total child teardown budget at daemon shutdown.
pub fn shutdown_timeout() -> Duration {
    ms_env("AGNT_SHUTDOWN_TIMEOUT_MS", Duration::from_secs(10))
}

/// Health check override; tests disable with 0.
pub fn health_check_period() -> Option<Duration> {
    match std::env::var("AGNT_HEALTH_CHECK_MS") {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(0) => None,
            Ok(ms) => Some(Duration::from_millis(ms)),
            Err(_) => Some(agnt_proc::HEALTH_CHECK_PERIOD),
        },
        Err(_) => Some(agnt_proc::HEALTH_CHECK_PERIOD),
    }
}

fn ms_env(var: &str, default: Duration) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
