// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `agnt` — CLI front-end over the daemon.
//!
//! The tool-server adapter speaks the wire protocol directly; this binary
//! covers daemon management plus a few inspection commands, and is the
//! target the resilient client spawns for auto-start.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;
mod exit_error;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_error::ExitError;

#[derive(Parser)]
#[command(name = "agnt", about = "Developer-side control plane for AI-assisted web dev")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Daemon management
    Daemon(commands::daemon::DaemonArgs),
    /// Managed processes
    Proc(commands::proc::ProcArgs),
    /// Reverse proxies
    Proxy(commands::proxy::ProxyArgs),
    /// Detect the project type of a directory
    Detect {
        /// Directory to inspect (defaults to the current one)
        path: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Daemon(args) => commands::daemon::run(args).await,
        Command::Proc(args) => commands::proc::run(args).await,
        Command::Proxy(args) => commands::proxy::run(args).await,
        Command::Detect { path } => commands::detect::run(path).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("agnt: {e}");
            ExitCode::from(e.code.clamp(0, 255) as u8)
        }
    }
}
