// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One IPC connection: handshake, sequential dispatch, write pump.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use agnt_core::ErrorKind;
use agnt_wire::{read_line, write_line, Registry, Reply, Request, WireError};
use tokio::io::BufReader;
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::env::{handler_timeout, ipc_timeout, PROTOCOL_VERSION};
use crate::hub::handlers::{HandlerBox, HandlerCtx};
use crate::hub::subscribers::ConnectionShared;
use crate::hub::HubCtx;

/// Replies and handler-streamed results; senders wait, nothing drops.
const RESP_QUEUE_CAPACITY: usize = 64;

/// Fanned-out event lines; overflow drops the event.
const EVENT_QUEUE_CAPACITY: usize = 256;

/// Idle read window; the resilient client pings well inside it.
const IDLE_READ_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

pub async fn run_connection(
    stream: UnixStream,
    ctx: Arc<HubCtx>,
    registry: Arc<Registry<HandlerBox>>,
    conn_id: u64,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let (resp_tx, mut resp_rx) = mpsc::channel::<String>(RESP_QUEUE_CAPACITY);
    let (event_tx, mut event_rx) = mpsc::channel::<String>(EVENT_QUEUE_CAPACITY);
    let shared = Arc::new(ConnectionShared::new(conn_id, resp_tx, event_tx));
    ctx.subscribers.register(Arc::clone(&shared));
    debug!(conn_id, "connection opened");

    // Write pump. Replies take priority over fanned-out events; within
    // each channel queue order is preserved.
    let writer = tokio::spawn(async move {
        let mut resp_open = true;
        let mut event_open = true;
        while resp_open || event_open {
            let line = tokio::select! {
                biased;
                resp = resp_rx.recv(), if resp_open => match resp {
                    Some(line) => line,
                    None => {
                        resp_open = false;
                        continue;
                    }
                },
                event = event_rx.recv(), if event_open => match event {
                    Some(line) => line,
                    None => {
                        event_open = false;
                        continue;
                    }
                },
            };
            if write_line(&mut write_half, &line, ipc_timeout()).await.is_err() {
                break;
            }
        }
    });

    read_loop(&mut reader, &ctx, &registry, &shared).await;

    ctx.subscribers.remove(conn_id);
    ctx.sessions.detach_conn(conn_id);
    // Dropping the last sender lets the write pump drain and exit.
    drop(shared);
    let _ = tokio::time::timeout(ipc_timeout(), writer).await;
    debug!(conn_id, "connection closed");
}

async fn read_loop(
    reader: &mut BufReader<tokio::net::unix::OwnedReadHalf>,
    ctx: &Arc<HubCtx>,
    registry: &Registry<HandlerBox>,
    shared: &Arc<ConnectionShared>,
) {
    let mut handshaken = false;
    loop {
        let line = tokio::select! {
            line = read_line(reader, IDLE_READ_TIMEOUT) => line,
            () = ctx.handlers_cancel.cancelled() => return,
        };
        let line = match line {
            Ok(line) => line,
            Err(WireError::ConnectionClosed) => return,
            Err(e) => {
                debug!(conn = shared.id, error = %e, "read error");
                return;
            }
        };
        if line.is_empty() {
            continue;
        }

        let request = match Request::parse(&line) {
            Ok(request) => request,
            Err(e) => {
                if !shared.send_reply(&Reply::err(ErrorKind::Usage, e.to_string())).await {
                    return;
                }
                continue;
            }
        };

        // Handshake gate: nothing but HELLO before version negotiation.
        if request.verb == "HELLO" {
            let reply = negotiate(&request);
            let ok = reply_ok(&reply);
            if !shared.send_reply(&reply).await || !ok {
                return;
            }
            handshaken = true;
            continue;
        }
        if !handshaken {
            let _ = shared
                .send_reply(&Reply::err(ErrorKind::Usage, "expected HELLO handshake"))
                .await;
            return;
        }

        if request.verb == "PING" {
            if !shared.send_reply(&Reply::ok(vec!["PONG".to_string()])).await {
                return;
            }
            continue;
        }

        let reply = dispatch(ctx, registry, shared, &request).await;
        if !shared.send_reply(&reply).await {
            return;
        }
    }
}

fn negotiate(request: &Request) -> Reply {
    let offered = request.args.first().map(String::as_str).unwrap_or("");
    if major_version(offered) == major_version(PROTOCOL_VERSION) {
        Reply::ok(vec![PROTOCOL_VERSION.to_string()])
    } else {
        Reply::err(ErrorKind::VersionMismatch, format!("daemon speaks {PROTOCOL_VERSION}"))
    }
}

fn major_version(version: &str) -> Option<u32> {
    version.split('.').next().and_then(|major| major.parse().ok())
}

async fn dispatch(
    ctx: &Arc<HubCtx>,
    registry: &Registry<HandlerBox>,
    shared: &Arc<ConnectionShared>,
    request: &Request,
) -> Reply {
    let resolved = match registry.resolve(request) {
        Ok(dispatch) => dispatch,
        Err(e) => return Reply::err(e.kind(), e.to_string()),
    };

    ctx.inflight.fetch_add(1, Ordering::SeqCst);
    let handler_ctx = HandlerCtx { hub: ctx, conn: shared };
    let reply = tokio::select! {
        result = tokio::time::timeout(
            handler_timeout(),
            resolved.handler.handle(handler_ctx, resolved.subverb, resolved.args),
        ) => match result {
            Ok(reply) => reply,
            Err(_) => {
                warn!(verb = %request.verb, "handler deadline exceeded");
                Reply::err(ErrorKind::Timeout, "handler deadline exceeded")
            }
        },
        () = ctx.handlers_cancel.cancelled() => {
            Reply::err(ErrorKind::Cancelled, "daemon shutting down")
        }
    };
    ctx.inflight.fetch_sub(1, Ordering::SeqCst);
    reply
}

fn reply_ok(reply: &Reply) -> bool {
    matches!(reply, Reply::Ok(_))
}
