// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconnecting connection wrapper.
//!
//! Presents the same request API as [`DaemonClient`] and hides daemon
//! restarts behind jittered exponential backoff, a PING heartbeat, and
//! optional auto-start. A request caught by a disconnect reports
//! `Cancelled`; the next request dials again.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use agnt_daemon::env;
use agnt_wire::{Reply, Request};
use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::client::{DaemonClient, REQUEST_TIMEOUT};
use crate::error::ClientError;
use crate::start::start_daemon;

/// Backoff floor (first retry).
pub const BACKOFF_MIN: Duration = Duration::from_millis(100);
/// Backoff ceiling.
pub const BACKOFF_MAX: Duration = Duration::from_secs(30);
/// Jitter applied to every delay, as a fraction.
pub const BACKOFF_JITTER: f64 = 0.2;
/// Heartbeat period.
pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(10);

/// Wrapper configuration.
#[derive(Clone)]
pub struct ClientConfig {
    pub socket_path: PathBuf,
    /// Spawn the daemon when the dial fails.
    pub auto_start: bool,
    /// Dial attempts per connect() call before giving up.
    pub max_dial_attempts: u32,
    pub heartbeat: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_path: env::socket_path(),
            auto_start: true,
            max_dial_attempts: 8,
            heartbeat: HEARTBEAT_PERIOD,
        }
    }
}

/// Event callbacks; each fires once per transition.
#[derive(Default)]
pub struct Callbacks {
    pub on_connect: Option<Box<dyn Fn() + Send + Sync>>,
    pub on_disconnect: Option<Box<dyn Fn() + Send + Sync>>,
    pub on_reconnect_failed: Option<Box<dyn Fn() + Send + Sync>>,
}

/// Exponential backoff with jitter for attempt `n` (0-based).
pub fn backoff_delay(attempt: u32) -> Duration {
    let base = BACKOFF_MIN.as_millis() as f64 * 2f64.powi(attempt.min(16) as i32);
    let capped = base.min(BACKOFF_MAX.as_millis() as f64);
    let jitter = capped * BACKOFF_JITTER * rand::rng().random_range(-1.0..=1.0);
    Duration::from_millis((capped + jitter).max(1.0) as u64)
}

/// The reconnecting client.
pub struct ResilientClient {
    config: ClientConfig,
    callbacks: Callbacks,
    inner: Mutex<Option<DaemonClient>>,
}

impl ResilientClient {
    /// Build the wrapper and dial eagerly.
    pub async fn connect(
        config: ClientConfig,
        callbacks: Callbacks,
    ) -> Result<Arc<Self>, ClientError> {
        let this = Arc::new(Self { config, callbacks, inner: Mutex::new(None) });
        this.ensure_connected().await?;
        Ok(this)
    }

    /// Dial with backoff (and auto-start) until connected or the attempt
    /// budget is spent.
    async fn dial(&self) -> Result<DaemonClient, ClientError> {
        let mut last_error = ClientError::NotRunning;
        for attempt in 0..self.config.max_dial_attempts {
            match DaemonClient::connect(&self.config.socket_path).await {
                Ok(client) => return Ok(client),
                Err(e @ ClientError::VersionMismatch(_)) => return Err(e),
                Err(e) => last_error = e,
            }
            if self.config.auto_start && attempt == 0 {
                if let Err(e) = start_daemon(&self.config.socket_path).await {
                    warn!(error = %e, "daemon auto-start failed");
                    last_error = e;
                }
                continue;
            }
            let delay = backoff_delay(attempt);
            debug!(attempt, delay_ms = delay.as_millis() as u64, "dial failed, backing off");
            tokio::time::sleep(delay).await;
        }
        if let Some(cb) = &self.callbacks.on_reconnect_failed {
            cb();
        }
        Err(last_error)
    }

    async fn ensure_connected(&self) -> Result<(), ClientError> {
        let mut inner = self.inner.lock().await;
        if inner.is_some() {
            return Ok(());
        }
        let client = self.dial().await?;
        *inner = Some(client);
        if let Some(cb) = &self.callbacks.on_connect {
            cb();
        }
        Ok(())
    }

    /// True while a connection is held.
    pub async fn is_connected(&self) -> bool {
        self.inner.lock().await.is_some()
    }

    /// Send one request. A connection lost mid-request surfaces as
    /// `Cancelled`; the next call reconnects.
    pub async fn request(&self, request: &Request) -> Result<(Vec<Reply>, Vec<String>), ClientError> {
        self.ensure_connected().await?;
        let mut inner = self.inner.lock().await;
        let Some(client) = inner.as_mut() else {
            return Err(ClientError::Cancelled);
        };
        match client.request_ok(request, REQUEST_TIMEOUT).await {
            Ok(result) => Ok(result),
            Err(e @ ClientError::Daemon { .. }) => Err(e),
            Err(e) => {
                // Transport trouble: drop the connection, report the
                // in-flight request as cancelled.
                debug!(error = %e, "connection lost mid-request");
                *inner = None;
                if let Some(cb) = &self.callbacks.on_disconnect {
                    cb();
                }
                Err(ClientError::Cancelled)
            }
        }
    }

    /// Heartbeat loop: PING on the period, reconnect on a missed beat.
    pub fn spawn_heartbeat(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.config.heartbeat);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                // Distinguish a fresh disconnect (fires the callback once)
                // from an already-down connection.
                let (connected, dropped_now) = {
                    let mut inner = this.inner.lock().await;
                    match inner.as_mut() {
                        Some(client) => {
                            if client.ping(Duration::from_secs(3)).await {
                                (true, false)
                            } else {
                                *inner = None;
                                (false, true)
                            }
                        }
                        None => (false, false),
                    }
                };
                if dropped_now {
                    if let Some(cb) = &this.callbacks.on_disconnect {
                        cb();
                    }
                }
                if !connected && this.ensure_connected().await.is_err() {
                    debug!("heartbeat reconnect failed");
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "resilient_tests.rs"]
mod tests;
