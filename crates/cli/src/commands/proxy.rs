// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `agnt proxy` — reverse proxy inspection.

use agnt_wire::{Reply, Request};
use clap::{Args, Subcommand};

use super::connect;
use crate::exit_error::ExitError;

#[derive(Args)]
pub struct ProxyArgs {
    #[command(subcommand)]
    pub command: ProxyCommand,
}

#[derive(Subcommand)]
pub enum ProxyCommand {
    /// List proxies
    List {
        /// Include every project
        #[arg(long)]
        global: bool,
    },
    /// Start a proxy in front of a target URL
    Start {
        id: String,
        target: String,
        /// Explicit port (otherwise hash-derived from the target)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Stop a proxy
    Stop { id: String },
    /// Show one proxy
    Status { id: String },
}

pub async fn run(args: ProxyArgs) -> Result<(), ExitError> {
    let client = connect().await?;
    match args.command {
        ProxyCommand::List { global } => {
            let mut req_args = vec!["LIST".to_string()];
            if global {
                req_args.push("global=true".to_string());
            } else if let Ok(cwd) = std::env::current_dir() {
                req_args.push(format!("cwd={}", cwd.display()));
            }
            let request = Request::new("PROXY", req_args);
            let (events, args) =
                client.request(&request).await?;
            for event in events {
                if let Reply::Event { args, .. } = event {
                    print_entry(args.first().map(String::as_str).unwrap_or("{}"));
                }
            }
            println!("{} proxy(ies)", args.first().map(String::as_str).unwrap_or("0"));
            Ok(())
        }
        ProxyCommand::Start { id, target, port } => {
            let mut req_args = vec!["START".to_string(), id, target];
            if let Some(port) = port {
                req_args.push(format!("port={port}"));
            }
            if let Ok(cwd) = std::env::current_dir() {
                req_args.push(format!("cwd={}", cwd.display()));
            }
            let request = Request::new("PROXY", req_args);
            let (_, args) = client.request(&request).await?;
            println!(
                "Proxy {} listening on port {}",
                args.first().map(String::as_str).unwrap_or("?"),
                args.get(1).map(String::as_str).unwrap_or("?"),
            );
            Ok(())
        }
        ProxyCommand::Stop { id } => {
            let request = Request::new("PROXY", vec!["STOP".into(), id.clone()]);
            client.request(&request).await?;
            println!("Stopped {id}");
            Ok(())
        }
        ProxyCommand::Status { id } => {
            let request = Request::new("PROXY", vec!["STATUS".into(), id]);
            let (_, args) = client.request(&request).await?;
            print_entry(args.first().map(String::as_str).unwrap_or("{}"));
            Ok(())
        }
    }
}

fn print_entry(json: &str) {
    match serde_json::from_str::<serde_json::Value>(json) {
        Ok(value) => {
            let id = value["proxy_id"].as_str().unwrap_or("?");
            let state = value["state"].as_str().unwrap_or("?");
            let port = value["port"].as_u64().unwrap_or(0);
            let target = value["target"].as_str().unwrap_or("?");
            match value["public_url"].as_str() {
                Some(url) => println!("{id:16} {state:10} :{port:<6} {target}  ({url})"),
                None => println!("{id:16} {state:10} :{port:<6} {target}"),
            }
        }
        Err(_) => println!("{json}"),
    }
}
