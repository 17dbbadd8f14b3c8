// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod daemon;
pub mod detect;
pub mod proc;
pub mod proxy;

use std::sync::Arc;

use agnt_client::{Callbacks, ClientConfig, ResilientClient};
use agnt_daemon::env;

use crate::exit_error::ExitError;

/// Resilient connection with auto-start: the default for commands that
/// talk to the daemon.
pub async fn connect() -> Result<Arc<ResilientClient>, ExitError> {
    let config = ClientConfig { socket_path: env::socket_path(), ..Default::default() };
    Ok(ResilientClient::connect(config, Callbacks::default()).await?)
}
