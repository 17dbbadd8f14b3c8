// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::pidtrack::PidTracker;
use crate::spawn::SpawnSpec;
use agnt_core::ProcState;
use std::time::Duration;

fn manager() -> Arc<ProcessManager> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pidtracker.json");
    std::mem::forget(dir);
    Arc::new(ProcessManager::new(Arc::new(PidTracker::load(path))))
}

#[tokio::test]
async fn monitor_stops_on_cancel() {
    let cancel = CancellationToken::new();
    let handle = HealthMonitor::spawn(manager(), Some(Duration::from_millis(10)), cancel.clone());

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn sweep_leaves_healthy_processes_alone() {
    let manager = manager();
    let mut spec = SpawnSpec::new("healthy", "sh");
    spec.args = vec!["-c".into(), "sleep 5".into()];
    spec.project_path = std::env::temp_dir();
    let process = manager.start(spec).unwrap();

    for _ in 0..200 {
        if process.state() == ProcState::Running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let cancel = CancellationToken::new();
    HealthMonitor::spawn(Arc::clone(&manager), Some(Duration::from_millis(20)), cancel.clone());
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(process.state(), ProcState::Running, "probe must not disturb a live child");
    cancel.cancel();
    manager.stop("healthy", crate::process::StopProfile::Immediate).await.unwrap();
}
