// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Platform-specific process plumbing.
//!
//! Higher layers see four capabilities: spawn the child as the leader of
//! its own group, signal a whole group, probe liveness, and translate
//! signal names. POSIX uses process groups via `nix`; the Windows half is
//! a minimal std-only stand-in (taskkill), kept behind cfg.

use std::io;

/// Wire-facing signal names accepted by `PROC SIGNAL`.
pub const SIGNAL_NAMES: [&str; 6] = ["TERM", "KILL", "INT", "HUP", "USR1", "USR2"];

#[cfg(unix)]
mod imp {
    use super::*;
    use nix::sys::signal::{kill, killpg, Signal};
    use nix::unistd::Pid;

    /// Make the child the leader of a new process group.
    pub fn configure_group(cmd: &mut tokio::process::Command) {
        cmd.process_group(0);
    }

    pub fn parse_signal(name: &str) -> Option<i32> {
        let sig = match name {
            "TERM" => Signal::SIGTERM,
            "KILL" => Signal::SIGKILL,
            "INT" => Signal::SIGINT,
            "HUP" => Signal::SIGHUP,
            "USR1" => Signal::SIGUSR1,
            "USR2" => Signal::SIGUSR2,
            _ => return None,
        };
        Some(sig as i32)
    }

    fn to_signal(signum: i32) -> io::Result<Signal> {
        Signal::try_from(signum).map_err(|e| io::Error::other(e))
    }

    /// Signal every process in the group.
    pub fn kill_group(pgid: u32, signum: i32) -> io::Result<()> {
        killpg(Pid::from_raw(pgid as i32), to_signal(signum)?).map_err(io::Error::from)
    }

    /// Signal a single process.
    pub fn kill_pid(pid: u32, signum: i32) -> io::Result<()> {
        kill(Pid::from_raw(pid as i32), to_signal(signum)?).map_err(io::Error::from)
    }

    /// Liveness probe: signal 0 touches nothing but checks existence.
    pub fn pid_alive(pid: u32) -> bool {
        kill(Pid::from_raw(pid as i32), None).is_ok()
    }

    pub const SIGTERM: i32 = Signal::SIGTERM as i32;
    pub const SIGKILL: i32 = Signal::SIGKILL as i32;
}

#[cfg(windows)]
mod imp {
    use super::*;

    pub fn configure_group(_cmd: &mut tokio::process::Command) {
        // Job-object attachment would go here; the tree-kill below covers
        // teardown for the common dev-server case.
    }

    pub fn parse_signal(name: &str) -> Option<i32> {
        match name {
            "TERM" | "INT" | "HUP" => Some(SIGTERM),
            "KILL" => Some(SIGKILL),
            _ => None,
        }
    }

    pub fn kill_group(pgid: u32, _signum: i32) -> io::Result<()> {
        let status = std::process::Command::new("taskkill")
            .args(["/T", "/F", "/PID", &pgid.to_string()])
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other("taskkill failed"))
        }
    }

    pub fn kill_pid(pid: u32, signum: i32) -> io::Result<()> {
        kill_group(pid, signum)
    }

    pub fn pid_alive(pid: u32) -> bool {
        std::process::Command::new("tasklist")
            .args(["/FI", &format!("PID eq {pid}"), "/NH"])
            .output()
            .map(|out| String::from_utf8_lossy(&out.stdout).contains(&pid.to_string()))
            .unwrap_or(false)
    }

    pub const SIGTERM: i32 = 15;
    pub const SIGKILL: i32 = 9;
}

pub use imp::{
    configure_group, kill_group, kill_pid, parse_signal, pid_alive, SIGKILL, SIGTERM,
};
