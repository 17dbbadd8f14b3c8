// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle specs: start/status/stop through the CLI.

use crate::prelude::TestEnv;
use serial_test::serial;

#[test]
#[serial]
fn status_reports_not_running_without_a_daemon() {
    let env = TestEnv::new();
    let out = env.run(&["daemon", "status"]);
    assert!(out.status.success());
    assert!(stdout_of(&out).contains("Daemon not running"));
}

#[test]
#[serial]
fn start_status_stop_roundtrip() {
    let env = TestEnv::new();

    let out = env.run(&["daemon", "start"]);
    assert!(out.status.success(), "start failed: {}", stderr_of(&out));
    assert!(stdout_of(&out).contains("Daemon started"));

    let out = env.run(&["daemon", "status"]);
    assert!(stdout_of(&out).contains("Status: running"));

    // A second start refuses with the documented exit code.
    let out = env.run(&["daemon", "start"]);
    assert_eq!(out.status.code(), Some(3));

    let out = env.run(&["daemon", "stop"]);
    assert!(out.status.success(), "stop failed: {}", stderr_of(&out));
    assert!(stdout_of(&out).contains("Daemon stopped"));

    let out = env.run(&["daemon", "status"]);
    assert!(stdout_of(&out).contains("Daemon not running"));
}

#[test]
#[serial]
fn stop_without_daemon_is_a_noop() {
    let env = TestEnv::new();
    let out = env.run(&["daemon", "stop"]);
    assert!(out.status.success());
    assert!(stdout_of(&out).contains("Daemon not running"));
}

#[test]
#[serial]
fn proxy_list_is_empty_on_a_fresh_daemon() {
    let env = TestEnv::new();
    assert!(env.run(&["daemon", "start"]).status.success());

    let out = env.run(&["proxy", "list"]);
    assert!(out.status.success(), "list failed: {}", stderr_of(&out));
    assert!(stdout_of(&out).contains("0 proxy(ies)"));

    assert!(env.run(&["daemon", "stop"]).status.success());
}

fn stdout_of(out: &std::process::Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr_of(out: &std::process::Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}
