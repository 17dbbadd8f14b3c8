// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `agnt proc` — managed process inspection.

use agnt_wire::{Reply, Request};
use clap::{Args, Subcommand};

use super::connect;
use crate::exit_error::ExitError;

#[derive(Args)]
pub struct ProcArgs {
    #[command(subcommand)]
    pub command: ProcCommand,
}

#[derive(Subcommand)]
pub enum ProcCommand {
    /// List managed processes
    List {
        /// Include every project
        #[arg(long)]
        global: bool,
    },
    /// Show one process
    Status { id: String },
    /// Stop a process
    Stop {
        id: String,
        /// Kill immediately instead of the graceful profile
        #[arg(long)]
        immediate: bool,
    },
}

pub async fn run(args: ProcArgs) -> Result<(), ExitError> {
    let client = connect().await?;
    match args.command {
        ProcCommand::List { global } => {
            let mut req_args = vec!["LIST".to_string()];
            if global {
                req_args.push("global=true".to_string());
            } else if let Ok(cwd) = std::env::current_dir() {
                req_args.push(format!("cwd={}", cwd.display()));
            }
            let request = Request::new("PROC", req_args);
            let (events, args) =
                client.request(&request).await?;
            for event in events {
                if let Reply::Event { args, .. } = event {
                    print_entry(args.first().map(String::as_str).unwrap_or("{}"));
                }
            }
            println!("{} process(es)", args.first().map(String::as_str).unwrap_or("0"));
            Ok(())
        }
        ProcCommand::Status { id } => {
            let request = Request::new("PROC", vec!["STATUS".into(), id]);
            let (_, args) = client.request(&request).await?;
            print_entry(args.first().map(String::as_str).unwrap_or("{}"));
            Ok(())
        }
        ProcCommand::Stop { id, immediate } => {
            let mut req_args = vec!["STOP".to_string(), id.clone()];
            if immediate {
                req_args.push("immediate=true".to_string());
            }
            let request = Request::new("PROC", req_args);
            client.request(&request).await?;
            println!("Stopped {id}");
            Ok(())
        }
    }
}

fn print_entry(json: &str) {
    match serde_json::from_str::<serde_json::Value>(json) {
        Ok(value) => {
            let id = value["process_id"].as_str().unwrap_or("?");
            let state = value["state"].as_str().unwrap_or("?");
            let command = value["command"].as_str().unwrap_or("?");
            match value["pid"].as_u64() {
                Some(pid) => println!("{id:20} {state:10} pid={pid:<8} {command}"),
                None => println!("{id:20} {state:10} {:13}{command}", ""),
            }
        }
        Err(_) => println!("{json}"),
    }
}
