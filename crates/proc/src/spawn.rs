// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child spawning and output pumps.
//!
//! Standard streams are piped and pumped into the process's ring buffers.
//! With a PTY, both streams multiplex through the master side and land in
//! the stdout ring.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use agnt_core::{RestartPolicy, RingBuffer};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::platform;

/// Everything needed to (re)spawn a managed process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnSpec {
    /// Client-supplied process id, unique within the manager.
    pub process_id: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Project path; doubles as the working directory.
    pub project_path: PathBuf,
    #[serde(default)]
    pub pty: bool,
    #[serde(default)]
    pub restart: RestartPolicy,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl SpawnSpec {
    pub fn new(process_id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            process_id: process_id.into(),
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            project_path: PathBuf::from("."),
            pty: false,
            restart: RestartPolicy::Never,
            labels: HashMap::new(),
        }
    }
}

/// A live child plus its group id.
pub(crate) struct Spawned {
    pub child: Child,
    pub pid: u32,
    pub pgid: Option<u32>,
}

/// Spawn per the spec, wiring output into the given rings.
pub(crate) fn spawn_child(
    spec: &SpawnSpec,
    stdout: Arc<RingBuffer>,
    stderr: Arc<RingBuffer>,
) -> std::io::Result<Spawned> {
    if spec.pty {
        return spawn_pty(spec, stdout);
    }

    let mut cmd = Command::new(&spec.command);
    cmd.args(&spec.args)
        .envs(&spec.env)
        .current_dir(&spec.project_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(false);
    platform::configure_group(&mut cmd);

    let mut child = cmd.spawn()?;
    let pid = child.id().ok_or_else(|| std::io::Error::other("child exited before id read"))?;

    if let Some(out) = child.stdout.take() {
        pump(out, stdout);
    }
    if let Some(err) = child.stderr.take() {
        pump(err, stderr);
    }

    debug!(id = %spec.process_id, pid, "spawned child");
    // The child is its own group leader, so pgid == pid.
    Ok(Spawned { child, pid, pgid: Some(pid) })
}

/// Pump an async reader into a ring buffer until EOF.
fn pump<R>(mut reader: R, ring: Arc<RingBuffer>)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; 8192];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => ring.write(&buf[..n]),
            }
        }
    });
}

#[cfg(unix)]
fn spawn_pty(spec: &SpawnSpec, stdout: Arc<RingBuffer>) -> std::io::Result<Spawned> {
    use std::os::fd::OwnedFd;

    let pty = nix::pty::openpty(None, None).map_err(std::io::Error::from)?;
    let master: OwnedFd = pty.master;
    let slave: OwnedFd = pty.slave;

    let slave_out = slave.try_clone()?;
    let slave_err = slave.try_clone()?;

    let mut cmd = Command::new(&spec.command);
    cmd.args(&spec.args)
        .envs(&spec.env)
        .env("TERM", "xterm-256color")
        .current_dir(&spec.project_path)
        .stdin(Stdio::from(slave))
        .stdout(Stdio::from(slave_out))
        .stderr(Stdio::from(slave_err))
        .kill_on_drop(false);
    platform::configure_group(&mut cmd);

    let child = cmd.spawn()?;
    let pid = child.id().ok_or_else(|| std::io::Error::other("child exited before id read"))?;

    // Both streams arrive on the master side; pump them into the stdout
    // ring from a blocking thread (PTY fds are not async-friendly).
    let master_file = std::fs::File::from(master);
    tokio::task::spawn_blocking(move || {
        use std::io::Read;
        let mut file = master_file;
        let mut buf = [0u8; 8192];
        loop {
            match file.read(&mut buf) {
                // EIO is the normal PTY close signal.
                Ok(0) | Err(_) => break,
                Ok(n) => stdout.write(&buf[..n]),
            }
        }
    });

    debug!(id = %spec.process_id, pid, "spawned child on pty");
    Ok(Spawned { child, pid, pgid: Some(pid) })
}

#[cfg(not(unix))]
fn spawn_pty(_spec: &SpawnSpec, _stdout: Arc<RingBuffer>) -> std::io::Result<Spawned> {
    Err(std::io::Error::other("pty not supported on this platform"))
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
