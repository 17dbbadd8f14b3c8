// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::hub::subscribers::{ConnectionShared, Subscribers};
use crate::hub::HubCtx;
use crate::lifecycle::Config;
use crate::scheduler::Scheduler;
use crate::sessions::{DeliverySink, SessionStore};
use crate::state::spawn_saver;
use crate::tunnel::TunnelSupervisor;
use agnt_core::{ErrorKind, SystemClock};
use agnt_proc::{PidTracker, ProcessManager};
use agnt_proxy::ProxyManager;
use agnt_wire::{Reply, Request};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

struct Fixture {
    ctx: Arc<HubCtx>,
    conn: Arc<ConnectionShared>,
    /// Reply channel: terminal replies and handler-streamed events.
    resp: mpsc::Receiver<String>,
    /// Fan-out channel: subscriptions and session deliveries.
    events: mpsc::Receiver<String>,
    _dir: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        state_dir: dir.path().to_path_buf(),
        socket_path: dir.path().join("agnt.sock"),
        lock_path: dir.path().join("daemon.pid"),
        log_path: dir.path().join("daemon.log"),
        state_path: dir.path().join("state.json"),
        scheduler_path: dir.path().join("scheduler.json"),
        pidtracker_path: dir.path().join("pidtracker.json"),
    };

    let tracker = Arc::new(PidTracker::load(&config.pidtracker_path));
    let procs = Arc::new(ProcessManager::new(tracker));
    let (proxies, _proxy_events) = ProxyManager::new();
    let proxies = Arc::new(proxies);
    let subscribers = Arc::new(Subscribers::new());
    let sessions = Arc::new(SessionStore::new(
        Arc::clone(&subscribers) as Arc<dyn DeliverySink>
    ));
    let scheduler = Arc::new(Scheduler::load(
        config.scheduler_path.clone(),
        Arc::clone(&sessions),
        SystemClock,
    ));
    let tunnels = Arc::new(TunnelSupervisor::new(Arc::clone(&procs), Arc::clone(&proxies)));
    let saver =
        spawn_saver(config.state_path.clone(), Arc::clone(&proxies), Arc::new(Notify::new()));

    let ctx = Arc::new(HubCtx {
        config,
        procs,
        proxies,
        sessions,
        scheduler,
        tunnels,
        saver,
        subscribers: Arc::clone(&subscribers),
        shutdown: Arc::new(Notify::new()),
        upgrading: AtomicBool::new(false),
        accept_cancel: CancellationToken::new(),
        handlers_cancel: CancellationToken::new(),
        inflight: AtomicUsize::new(0),
        start_time: Instant::now(),
    });

    let (resp_tx, resp) = mpsc::channel(64);
    let (event_tx, events) = mpsc::channel(64);
    let conn = Arc::new(ConnectionShared::new(1, resp_tx, event_tx));
    subscribers.register(Arc::clone(&conn));

    Fixture { ctx, conn, resp, events, _dir: dir }
}

async fn call(fixture: &Fixture, line: &str) -> Reply {
    let registry = build_registry();
    let request = Request::parse(line).unwrap();
    let resolved = registry.resolve(&request).unwrap();
    resolved
        .handler
        .handle(
            HandlerCtx { hub: &fixture.ctx, conn: &fixture.conn },
            resolved.subverb,
            resolved.args,
        )
        .await
}

fn ok_args(reply: Reply) -> Vec<String> {
    match reply {
        Reply::Ok(args) => args,
        other => panic!("expected OK, got {other:?}"),
    }
}

fn err_kind(reply: Reply) -> ErrorKind {
    match reply {
        Reply::Err { kind, .. } => kind,
        other => panic!("expected ERR, got {other:?}"),
    }
}

#[test]
fn registry_covers_the_wire_surface() {
    let registry = build_registry();
    for (verb, _) in agnt_wire::VERBS {
        assert!(registry.contains(verb), "{verb} unregistered");
    }
}

#[test]
fn split_args_separates_options() {
    let args = vec![
        "START".to_string(),
        "web".to_string(),
        "npm".to_string(),
        "--port=3000".to_string(),
        "cwd=/work".to_string(),
        "env.NODE_ENV=dev".to_string(),
    ];
    let (positional, options) = split_args(&args);
    assert_eq!(positional, vec!["START", "web", "npm", "--port=3000"]);
    assert_eq!(options.get("cwd"), Some(&"/work"));
    assert_eq!(options.get("env.NODE_ENV"), Some(&"dev"));
}

#[tokio::test]
async fn detect_reports_project_type() {
    let fixture = fixture();
    std::fs::write(fixture._dir.path().join("package.json"), b"{}").unwrap();
    let reply = call(
        &fixture,
        &format!("DETECT {} ;;", agnt_wire::encode_field(fixture._dir.path().to_str().unwrap())),
    )
    .await;
    assert_eq!(ok_args(reply), vec!["node"]);
}

#[tokio::test]
async fn proc_start_status_stop_roundtrip() {
    let fixture = fixture();

    let reply = call(&fixture, "PROC START worker sh -c sleep%2030 ;;").await;
    let args = ok_args(reply);
    assert_eq!(args[0], "worker");

    let status = ok_args(call(&fixture, "PROC STATUS worker ;;").await);
    let detail: serde_json::Value = serde_json::from_str(&status[0]).unwrap();
    assert_eq!(detail["process_id"], "worker");
    assert_eq!(detail["command"], "sh");

    let reply = call(&fixture, "PROC STOP worker immediate=true ;;").await;
    assert_eq!(ok_args(reply)[1], "stopped");

    // Gone after stop.
    assert_eq!(err_kind(call(&fixture, "PROC STATUS worker ;;").await), ErrorKind::NotFound);
}

#[tokio::test]
async fn proc_duplicate_id_is_already_exists() {
    let fixture = fixture();
    call(&fixture, "PROC START web sh -c sleep%2030 ;;").await;
    let reply = call(&fixture, "PROC START web sh -c sleep%2030 ;;").await;
    assert_eq!(err_kind(reply), ErrorKind::AlreadyExists);
    call(&fixture, "PROC STOP web immediate=true ;;").await;
}

#[tokio::test]
async fn proc_output_returns_encoded_bytes() {
    let fixture = fixture();
    call(&fixture, "PROC START echoer sh -c printf%20hello ;;").await;

    // Wait for the child to finish and the pump to drain.
    let mut data = String::new();
    for _ in 0..200 {
        let args = ok_args(call(&fixture, "PROC OUTPUT echoer ;;").await);
        if args[1] == "5" {
            data = args[3].clone();
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }
    assert_eq!(agnt_wire::decode_bytes(&data).unwrap(), b"hello");
}

#[tokio::test]
async fn proc_signal_rejects_unknown_names() {
    let fixture = fixture();
    call(&fixture, "PROC START sig sh -c sleep%2030 ;;").await;
    let reply = call(&fixture, "PROC SIGNAL sig BOOM ;;").await;
    assert_eq!(err_kind(reply), ErrorKind::Usage);
    call(&fixture, "PROC STOP sig immediate=true ;;").await;
}

#[tokio::test]
async fn proc_list_streams_events_then_count() {
    let mut fixture = fixture();
    call(&fixture, "PROC START listed sh -c sleep%2030 ;;").await;

    let reply = call(&fixture, "PROC LIST global=true ;;").await;
    assert_eq!(ok_args(reply), vec!["1"]);
    // Streamed results ride the reply channel, ordered before the OK.
    let event = fixture.resp.try_recv().unwrap();
    assert!(event.starts_with("EVENT proc "), "{event}");

    call(&fixture, "PROC STOP listed immediate=true ;;").await;
}

#[tokio::test]
async fn proxy_stop_unknown_id_is_not_found() {
    let fixture = fixture();
    assert_eq!(err_kind(call(&fixture, "PROXY STOP ghost ;;").await), ErrorKind::NotFound);
}

#[tokio::test]
async fn chaos_requires_existing_proxy() {
    let fixture = fixture();
    assert_eq!(err_kind(call(&fixture, "CHAOS ENABLE ghost ;;").await), ErrorKind::NotFound);
}

#[tokio::test]
async fn session_attach_send_and_flush() {
    let mut fixture = fixture();

    // Buffered before anyone attaches.
    fixture.ctx.sessions.ensure("k3xv9p", "/w".into());
    fixture.ctx.sessions.send("k3xv9p", "early").unwrap();

    let reply = call(&fixture, "SESSION GET k3xv9p attach=true ;;").await;
    let detail: serde_json::Value = serde_json::from_str(&ok_args(reply)[0]).unwrap();
    assert_eq!(detail["attached"], true);
    assert_eq!(detail["flushed"], 1);

    // The buffered message arrived on the fan-out channel.
    let line = fixture.events.try_recv().unwrap();
    assert!(line.starts_with("EVENT session k3xv9p"), "{line}");

    let reply = call(&fixture, "SESSION SEND k3xv9p check%20the%20build ;;").await;
    assert_eq!(ok_args(reply)[1], "delivered");
}

#[tokio::test]
async fn session_send_unknown_code_is_not_found() {
    let fixture = fixture();
    assert_eq!(
        err_kind(call(&fixture, "SESSION SEND ghost hi ;;").await),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn schedule_add_status_cancel() {
    let fixture = fixture();
    call(&fixture, "SESSION GET abc attach=true ;;").await;

    let args = ok_args(call(&fixture, "SCHEDULE ADD abc +60000 reminder ;;").await);
    let task_id = args[0].clone();
    assert!(task_id.starts_with("tsk-"));

    let status = ok_args(call(&fixture, &format!("SCHEDULE STATUS {task_id} ;;")).await);
    let detail: serde_json::Value = serde_json::from_str(&status[0]).unwrap();
    assert_eq!(detail["state"], "pending");

    let reply = call(&fixture, &format!("SCHEDULE CANCEL {task_id} ;;")).await;
    assert_eq!(ok_args(reply)[1], "cancelled");

    // Double-cancel is invalid state.
    let reply = call(&fixture, &format!("SCHEDULE CANCEL {task_id} ;;")).await;
    assert_eq!(err_kind(reply), ErrorKind::InvalidState);
}

#[tokio::test]
async fn subscribe_validates_keys() {
    let fixture = fixture();
    assert_eq!(ok_args(call(&fixture, "SUBSCRIBE traffic:app ;;").await)[1], "subscribed");
    assert!(fixture.conn.is_subscribed("traffic:app"));

    assert_eq!(err_kind(call(&fixture, "SUBSCRIBE telepathy ;;").await), ErrorKind::Usage);

    assert_eq!(
        ok_args(call(&fixture, "UNSUBSCRIBE traffic:app ;;").await)[1],
        "unsubscribed"
    );
    assert_eq!(
        err_kind(call(&fixture, "UNSUBSCRIBE traffic:app ;;").await),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn second_upgrade_claim_is_invalid_state() {
    let fixture = fixture();
    // Claim the upgrade flag directly; actually running the upgrade task
    // would exec over the test process.
    fixture.ctx.upgrading.store(true, Ordering::SeqCst);
    let reply = call(&fixture, "UPGRADE ;;").await;
    assert_eq!(err_kind(reply), ErrorKind::InvalidState);
}

#[tokio::test]
async fn tunnel_unknown_provider_is_usage() {
    let fixture = fixture();
    assert_eq!(
        err_kind(call(&fixture, "TUNNEL START teleport app ;;").await),
        ErrorKind::Usage
    );
}

#[tokio::test]
async fn currentpage_summary_with_no_browsers() {
    let fixture = fixture();
    let args = ok_args(call(&fixture, "CURRENTPAGE SUMMARY ;;").await);
    let summary: serde_json::Value = serde_json::from_str(&args[0]).unwrap();
    assert_eq!(summary["pages"], 0);
}
