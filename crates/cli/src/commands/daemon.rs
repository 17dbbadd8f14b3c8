// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `agnt daemon` — daemon management commands.

use std::io::{BufRead, BufReader};
use std::time::Duration;

use agnt_client::{start_daemon, ClientError, DaemonClient};
use agnt_daemon::env;
use clap::{Args, Subcommand};

use crate::exit_error::ExitError;

#[derive(Args)]
pub struct DaemonArgs {
    #[command(subcommand)]
    pub command: DaemonCommand,
}

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon in the background
    Start,
    /// Stop the daemon
    Stop,
    /// Check daemon status
    Status,
    /// View daemon logs
    Logs {
        /// Number of recent lines to show
        #[arg(short = 'n', long, default_value = "200")]
        limit: usize,
    },
    /// Request a graceful in-place upgrade
    Upgrade,
}

pub async fn run(args: DaemonArgs) -> Result<(), ExitError> {
    match args.command {
        DaemonCommand::Start => start().await,
        DaemonCommand::Stop => stop().await,
        DaemonCommand::Status => status().await,
        DaemonCommand::Logs { limit } => logs(limit),
        DaemonCommand::Upgrade => upgrade().await,
    }
}

async fn start() -> Result<(), ExitError> {
    let socket = env::socket_path();
    if DaemonClient::connect(&socket).await.is_ok() {
        return Err(ExitError::new(3, "daemon already running"));
    }
    start_daemon(&socket).await?;
    println!("Daemon started");
    Ok(())
}

async fn stop() -> Result<(), ExitError> {
    let Some(pid) = read_daemon_pid() else {
        println!("Daemon not running");
        return Ok(());
    };
    signal_daemon(pid)?;

    // Wait for the socket to disappear.
    let socket = env::socket_path();
    for _ in 0..100 {
        if DaemonClient::connect(&socket).await.is_err() {
            println!("Daemon stopped");
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Err(ExitError::new(10, "daemon did not stop in time"))
}

async fn status() -> Result<(), ExitError> {
    match DaemonClient::connect(&env::socket_path()).await {
        Ok(client) => {
            println!("Status: running");
            println!("Version: {}", client.version());
            Ok(())
        }
        Err(ClientError::NotRunning) => {
            println!("Daemon not running");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn logs(limit: usize) -> Result<(), ExitError> {
    let state_dir = env::state_dir()
        .ok_or_else(|| ExitError::new(10, "could not determine state directory"))?;
    let log_path = state_dir.join("daemon.log");
    if !log_path.exists() {
        println!("No log file found at {}", log_path.display());
        return Ok(());
    }
    let file = std::fs::File::open(&log_path).map_err(|e| ExitError::new(10, e.to_string()))?;
    let lines: Vec<String> = BufReader::new(file)
        .lines()
        .collect::<std::io::Result<_>>()
        .map_err(|e| ExitError::new(10, e.to_string()))?;
    let start = lines.len().saturating_sub(limit);
    for line in &lines[start..] {
        println!("{line}");
    }
    Ok(())
}

async fn upgrade() -> Result<(), ExitError> {
    let mut client = DaemonClient::connect(&env::socket_path()).await?;
    let request = agnt_wire::Request::new("UPGRADE", vec![]);
    client.request_ok(&request, Duration::from_secs(10)).await?;
    println!("Daemon upgrading");
    Ok(())
}

fn read_daemon_pid() -> Option<u32> {
    let state_dir = env::state_dir()?;
    let raw = std::fs::read_to_string(state_dir.join("daemon.pid")).ok()?;
    raw.trim().parse().ok()
}

#[cfg(unix)]
fn signal_daemon(pid: u32) -> Result<(), ExitError> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::ESRCH) => {
            println!("Daemon not running (stale pid file)");
            Ok(())
        }
        Err(e) => Err(ExitError::new(10, format!("failed to signal daemon: {e}"))),
    }
}

#[cfg(not(unix))]
fn signal_daemon(_pid: u32) -> Result<(), ExitError> {
    Err(ExitError::new(10, "daemon stop unsupported on this platform"))
}
