// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::instance::ProxySettings;
use crate::traffic_log::LogQuery;
use agnt_core::TrafficKind;
use serde_json::json;

fn instance() -> Arc<ProxyInstance> {
    ProxyInstance::new(ProxySettings {
        proxy_id: "app".into(),
        target: "http://localhost:3000".parse().unwrap(),
        port: 12345,
        explicit_port: true,
        project_path: std::env::temp_dir(),
        chaos: None,
        overlay: None,
        event_tx: None,
    })
    .unwrap()
}

fn channel() -> Arc<BrowserChannel> {
    Arc::new(BrowserChannel::new("ch".into()))
}

#[tokio::test]
async fn traffic_frames_land_in_the_log() {
    let instance = instance();
    let ch = channel();
    handle_frame(
        &instance,
        &ch,
        &json!({"type": "error", "payload": {"url": "/x", "message": "boom"}}).to_string(),
    );

    let entries = instance.traffic.query(&LogQuery::default());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, TrafficKind::Error);
    assert_eq!(entries[0].url(), Some("/x"));
}

#[tokio::test]
async fn frames_with_urls_update_current_page() {
    let instance = instance();
    let ch = channel();
    handle_frame(
        &instance,
        &ch,
        &json!({
            "type": "panel_message",
            "payload": {"url": "http://localhost:3000/admin", "title": "Admin"}
        })
        .to_string(),
    );

    let page = ch.page().unwrap();
    assert_eq!(page.url, "http://localhost:3000/admin");
    assert_eq!(page.title.as_deref(), Some("Admin"));
}

#[tokio::test]
async fn unknown_frame_types_are_ignored() {
    let instance = instance();
    let ch = channel();
    handle_frame(&instance, &ch, &json!({"type": "telepathy", "payload": {}}).to_string());
    handle_frame(&instance, &ch, "not json at all");

    assert!(instance.traffic.is_empty());
}

#[tokio::test]
async fn orphan_exec_responses_are_dropped() {
    let instance = instance();
    let ch = channel();
    handle_frame(
        &instance,
        &ch,
        &json!({
            "type": "response",
            "correlation_id": "never-issued",
            "payload": {"result": 42}
        })
        .to_string(),
    );

    // Dropped entirely: not even logged.
    assert!(instance.traffic.is_empty());
}

#[tokio::test]
async fn matched_exec_response_resolves_and_logs() {
    let instance = instance();
    let ch = channel();
    instance.channels.attach(Arc::clone(&ch));
    ch.touch(1);

    let exec_instance = Arc::clone(&instance);
    let exec = tokio::spawn(async move {
        exec_instance.execute("1+1".into(), std::time::Duration::from_secs(5)).await
    });

    // Wait for the execute frame to land in the channel queue.
    let frame = tokio::time::timeout(std::time::Duration::from_secs(2), ch.pop())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(frame.kind, "execute");
    let cid = frame.correlation_id.unwrap();

    handle_frame(
        &instance,
        &ch,
        &json!({"type": "response", "correlation_id": cid, "payload": {"result": 2}}).to_string(),
    );

    let value = exec.await.unwrap().unwrap();
    assert_eq!(value["result"], 2);

    let kinds: Vec<TrafficKind> =
        instance.traffic.query(&LogQuery::default()).iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&TrafficKind::Execution));
    assert!(kinds.contains(&TrafficKind::Response));
}
