// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::platform;

#[test]
fn record_and_reload_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pidtracker.json");

    let tracker = PidTracker::load(&path);
    tracker.record("web", 1234, Some(1234));
    tracker.record("api", 5678, None);

    let reloaded = PidTracker::load(&path);
    let mut recorded = reloaded.recorded();
    recorded.sort_by(|a, b| a.process_id.cmp(&b.process_id));
    assert_eq!(recorded.len(), 2);
    assert_eq!(recorded[1].process_id, "web");
    assert_eq!(recorded[1].pid, 1234);
    assert_eq!(recorded[1].pgid, Some(1234));
    assert_eq!(recorded[0].pgid, None);
}

#[test]
fn remove_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pidtracker.json");

    let tracker = PidTracker::load(&path);
    tracker.record("web", 1234, None);
    tracker.remove("web");

    assert!(PidTracker::load(&path).recorded().is_empty());
}

#[test]
fn corrupt_file_is_quarantined() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pidtracker.json");
    std::fs::write(&path, b"{not json").unwrap();

    let tracker = PidTracker::load(&path);
    assert!(tracker.recorded().is_empty());
    assert!(dir.path().join("pidtracker.json.corrupt").exists());

    // Tracker keeps working after quarantine.
    tracker.record("web", 42, None);
    assert_eq!(PidTracker::load(&path).recorded().len(), 1);
}

#[test]
fn missing_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = PidTracker::load(dir.path().join("pidtracker.json"));
    assert!(tracker.recorded().is_empty());
}

#[cfg(unix)]
#[test]
fn reap_kills_unclaimed_survivors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pidtracker.json");

    let mut child = std::process::Command::new("sleep")
        .arg("30")
        .spawn()
        .unwrap();
    let pid = child.id();
    assert!(platform::pid_alive(pid));

    let tracker = PidTracker::load(&path);
    tracker.record("orphan", pid, None);

    // Simulate restart: reload and reap with nothing claimed.
    let restarted = PidTracker::load(&path);
    let reaped = restarted.reap_orphans(&[]);
    assert_eq!(reaped, 1);

    let status = child.wait().unwrap();
    assert!(!status.success());
    assert!(restarted.recorded().is_empty());
}

#[test]
fn reap_skips_claimed_processes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pidtracker.json");

    let tracker = PidTracker::load(&path);
    // Our own pid is definitely alive; claiming it must protect it.
    tracker.record("me", std::process::id(), None);

    let reaped = tracker.reap_orphans(&["me".to_string()]);
    assert_eq!(reaped, 0);
    assert_eq!(tracker.recorded().len(), 1);
}

#[test]
fn dead_entries_are_pruned_without_killing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pidtracker.json");

    let tracker = PidTracker::load(&path);
    tracker.record("gone", 99_999_999, None);

    assert_eq!(tracker.reap_orphans(&[]), 0, "dead pid needs no kill");
    assert!(tracker.recorded().is_empty(), "entry dropped regardless");
}
