// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon auto-start under a cross-process lock.
//!
//! Concurrent CLI invocations race to start the daemon; the fs2 lock on a
//! well-known path serializes them so exactly one spawn happens and the
//! rest just wait for the socket to appear.

use std::path::{Path, PathBuf};
use std::time::Duration;

use agnt_daemon::env;
use fs2::FileExt;
use tracing::debug;

use crate::error::ClientError;

/// How long a starter waits for the socket after spawning.
const START_WAIT: Duration = Duration::from_secs(10);

/// Locate the daemon binary: sibling of the current executable, then
/// `PATH`.
pub fn find_daemon_binary() -> PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("agntd");
            if sibling.exists() {
                return sibling;
            }
        }
    }
    PathBuf::from("agntd")
}

/// Spawn the daemon (detached) and wait until the socket answers.
///
/// Serialized across processes via `${state_dir}/client-start.lock`.
pub async fn start_daemon(socket_path: &Path) -> Result<(), ClientError> {
    let state_dir = env::state_dir()
        .ok_or_else(|| ClientError::AutoStartFailed("no state directory".to_string()))?;
    std::fs::create_dir_all(&state_dir)?;
    let lock_path = state_dir.join("client-start.lock");

    // Block (off the async threads) until whoever is starting the daemon
    // finishes.
    let lock_file = tokio::task::spawn_blocking(move || -> std::io::Result<std::fs::File> {
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        file.lock_exclusive()?;
        Ok(file)
    })
    .await
    .map_err(|e| ClientError::AutoStartFailed(e.to_string()))??;

    // Someone else may have won the race while we waited.
    if socket_answers(socket_path).await {
        let _ = fs2::FileExt::unlock(&lock_file);
        return Ok(());
    }

    let binary = find_daemon_binary();
    debug!(binary = %binary.display(), "starting daemon");
    let spawned = std::process::Command::new(&binary)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn();
    if let Err(e) = spawned {
        let _ = fs2::FileExt::unlock(&lock_file);
        return Err(ClientError::AutoStartFailed(format!(
            "{}: {e}",
            binary.display()
        )));
    }

    let deadline = tokio::time::Instant::now() + START_WAIT;
    while tokio::time::Instant::now() < deadline {
        if socket_answers(socket_path).await {
            let _ = fs2::FileExt::unlock(&lock_file);
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let _ = fs2::FileExt::unlock(&lock_file);
    Err(ClientError::AutoStartFailed("daemon never opened its socket".to_string()))
}

async fn socket_answers(socket_path: &Path) -> bool {
    tokio::net::UnixStream::connect(socket_path).await.is_ok()
}
