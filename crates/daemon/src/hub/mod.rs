// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The hub: IPC listener, connection supervision, verb dispatch.
//!
//! Accepts connections on the per-user socket and runs two tasks per
//! connection (read, write) joined by a bounded channel. Requests on one
//! connection dispatch sequentially, so responses keep request order;
//! pushed events interleave freely.

pub mod connection;
pub mod handlers;
pub mod subscribers;

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize};
use std::sync::Arc;
use std::time::Instant;

use agnt_core::SystemClock;
use agnt_proc::ProcessManager;
use agnt_proxy::{ProxyEvent, ProxyManager};
use agnt_wire::Registry;
use tokio::net::UnixListener;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::lifecycle::Config;
use crate::scheduler::Scheduler;
use crate::sessions::SessionStore;
use crate::state::StateSaver;
use crate::tunnel::TunnelSupervisor;

use handlers::HandlerBox;
use subscribers::Subscribers;

/// Shared daemon context for all request handlers.
pub struct HubCtx {
    pub config: Config,
    pub procs: Arc<ProcessManager>,
    pub proxies: Arc<ProxyManager>,
    pub sessions: Arc<SessionStore>,
    pub scheduler: Arc<Scheduler<SystemClock>>,
    pub tunnels: Arc<TunnelSupervisor>,
    pub saver: StateSaver,
    pub subscribers: Arc<Subscribers>,
    /// Daemon stop requested (signal handler or fatal persistence error).
    pub shutdown: Arc<Notify>,
    /// Set once an upgrade has been claimed; a second `UPGRADE` loses.
    pub upgrading: AtomicBool,
    /// Cancelled to stop accepting new connections (upgrade).
    pub accept_cancel: CancellationToken,
    /// Cancelled after the drain deadline; in-flight handlers answer
    /// `ERR CANCELLED`.
    pub handlers_cancel: CancellationToken,
    /// Requests currently inside a handler.
    pub inflight: AtomicUsize,
    pub start_time: Instant,
}

/// Listener task for accepting socket connections.
pub struct Hub {
    listener: UnixListener,
    ctx: Arc<HubCtx>,
    registry: Arc<Registry<HandlerBox>>,
    next_conn_id: AtomicU64,
}

impl Hub {
    pub fn new(listener: UnixListener, ctx: Arc<HubCtx>) -> Self {
        Self {
            listener,
            ctx,
            registry: Arc::new(handlers::build_registry()),
            next_conn_id: AtomicU64::new(1),
        }
    }

    /// Accept until shutdown or upgrade stops the listener.
    pub async fn run(self) {
        info!("hub accepting connections");
        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, _)) => {
                            let conn_id = self
                                .next_conn_id
                                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                            let ctx = Arc::clone(&self.ctx);
                            let registry = Arc::clone(&self.registry);
                            tokio::spawn(async move {
                                connection::run_connection(stream, ctx, registry, conn_id).await;
                            });
                        }
                        Err(e) => error!("accept error: {}", e),
                    }
                }
                () = self.ctx.accept_cancel.cancelled() => {
                    info!("hub stopped accepting connections");
                    return;
                }
            }
        }
    }
}

/// Route proxy events to subscribed connections.
///
/// Traffic entries go to `traffic:<proxy_id>` / `traffic:*` subscribers;
/// instance failures go to `proxy_failed` subscribers.
pub fn spawn_event_router(
    mut events: mpsc::UnboundedReceiver<ProxyEvent>,
    subscribers: Arc<Subscribers>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                event = events.recv() => event,
                () = cancel.cancelled() => return,
            };
            match event {
                Some(ProxyEvent::Traffic { proxy_id, entry }) => {
                    let Ok(payload) = serde_json::to_string(&entry) else { continue };
                    let reply =
                        agnt_wire::Reply::event("traffic", vec![proxy_id.clone(), payload]);
                    subscribers.publish_traffic(&proxy_id, &reply);
                }
                Some(ProxyEvent::Failed { proxy_id }) => {
                    let reply = agnt_wire::Reply::event("proxy_failed", vec![proxy_id]);
                    subscribers.publish("proxy_failed", &reply);
                }
                None => return,
            }
        }
    })
}

/// Route permanent process failures to `proc_failed` subscribers.
pub fn spawn_proc_failure_router(
    mut failures: mpsc::UnboundedReceiver<String>,
    subscribers: Arc<Subscribers>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let process_id = tokio::select! {
                id = failures.recv() => id,
                () = cancel.cancelled() => return,
            };
            let Some(process_id) = process_id else { return };
            let reply = agnt_wire::Reply::event("proc_failed", vec![process_id]);
            subscribers.publish("proc_failed", &reply);
        }
    })
}
