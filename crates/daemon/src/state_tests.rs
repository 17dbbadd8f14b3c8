// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn record(id: &str) -> ProxyRecord {
    ProxyRecord {
        proxy_id: id.into(),
        target: "http://localhost:3000".into(),
        port: 12345,
        explicit_port: true,
        project_path: "/work/app".into(),
        chaos: None,
        overlay: None,
    }
}

#[test]
fn write_then_load_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let state = StateFile {
        version: STATE_SCHEMA_VERSION,
        proxies: vec![record("app")],
        settings: HashMap::from([("theme".to_string(), "dark".to_string())]),
        written_at: None,
    };
    write_state(&path, &state).unwrap();

    let loaded = load_state(&path).unwrap();
    assert_eq!(loaded.proxies, state.proxies);
    assert_eq!(loaded.settings.get("theme").map(String::as_str), Some("dark"));
}

#[test]
fn missing_file_loads_none() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_state(&dir.path().join("state.json")).is_none());
}

#[test]
fn corrupt_file_is_quarantined() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, b"][").unwrap();

    assert!(load_state(&path).is_none());
    assert!(!path.exists());
    assert!(dir.path().join("state.json.corrupt").exists());
}

#[test]
fn unknown_schema_version_is_quarantined() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, br#"{"v": 999, "proxies": []}"#).unwrap();

    assert!(load_state(&path).is_none());
    assert!(dir.path().join("state.json.corrupt").exists());
}

#[test]
fn write_is_atomic_no_tmp_left_behind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    write_state(&path, &StateFile { version: STATE_SCHEMA_VERSION, ..Default::default() })
        .unwrap();

    assert!(path.exists());
    assert!(!dir.path().join("state.json.tmp").exists());
}

#[tokio::test]
async fn saver_task_writes_on_request() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let (proxies, _events) = ProxyManager::new();
    let saver = spawn_saver(path.clone(), Arc::new(proxies), Arc::new(Notify::new()));

    saver.request_save();
    for _ in 0..100 {
        if path.exists() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let loaded = load_state(&path).unwrap();
    assert_eq!(loaded.version, STATE_SCHEMA_VERSION);
    assert!(loaded.proxies.is_empty());
}

#[tokio::test]
async fn saver_signals_fatal_after_repeated_failures() {
    // Point the saver at a path whose parent is a file: every write fails.
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"x").unwrap();
    let path = blocker.join("state.json");

    let (proxies, _events) = ProxyManager::new();
    let fatal = Arc::new(Notify::new());
    let saver = spawn_saver(path, Arc::new(proxies), Arc::clone(&fatal));

    let notified = fatal.notified();
    for _ in 0..3 {
        saver.request_save();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    tokio::time::timeout(std::time::Duration::from_secs(2), notified).await.unwrap();
}
