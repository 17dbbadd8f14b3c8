// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `agnt detect` — project-type detection.
//!
//! Runs locally when the daemon is down, so the command works everywhere.

use std::path::PathBuf;

use agnt_wire::Request;

use super::connect;
use crate::exit_error::ExitError;

pub async fn run(path: Option<PathBuf>) -> Result<(), ExitError> {
    let path = match path {
        Some(path) => path,
        None => std::env::current_dir().map_err(|e| ExitError::new(10, e.to_string()))?,
    };
    // The daemon resolves relative paths against its own cwd.
    let path = std::fs::canonicalize(&path).unwrap_or(path);

    match connect().await {
        Ok(mut client) => {
            let request =
                Request::new("DETECT", vec![path.to_string_lossy().into_owned()]);
            let (_, args) = client.request(&request).await?;
            println!("{}", args.first().map(String::as_str).unwrap_or("unknown"));
        }
        Err(_) => {
            println!("{}", agnt_daemon::detect::detect_project(&path));
        }
    }
    Ok(())
}
