// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use agnt_core::RingBuffer;
use std::time::Duration;

async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}

fn rings() -> (Arc<RingBuffer>, Arc<RingBuffer>) {
    (Arc::new(RingBuffer::new(4096)), Arc::new(RingBuffer::new(4096)))
}

#[tokio::test]
async fn stdout_lands_in_the_stdout_ring() {
    let (stdout, stderr) = rings();
    let mut spec = SpawnSpec::new("echo-test", "sh");
    spec.args = vec!["-c".into(), "printf hello-out".into()];
    spec.project_path = std::env::temp_dir();

    let mut spawned = spawn_child(&spec, Arc::clone(&stdout), Arc::clone(&stderr)).unwrap();
    assert!(spawned.pid > 0);
    let status = spawned.child.wait().await.unwrap();
    assert!(status.success());

    assert!(wait_until(|| stdout.read().data == b"hello-out").await);
    assert!(stderr.is_empty());
}

#[tokio::test]
async fn stderr_lands_in_the_stderr_ring() {
    let (stdout, stderr) = rings();
    let mut spec = SpawnSpec::new("err-test", "sh");
    spec.args = vec!["-c".into(), "printf oops >&2".into()];
    spec.project_path = std::env::temp_dir();

    let mut spawned = spawn_child(&spec, Arc::clone(&stdout), Arc::clone(&stderr)).unwrap();
    spawned.child.wait().await.unwrap();

    assert!(wait_until(|| stderr.read().data == b"oops").await);
    assert!(stdout.is_empty());
}

#[tokio::test]
async fn env_and_cwd_are_applied() {
    let (stdout, stderr) = rings();
    let dir = tempfile::tempdir().unwrap();
    let mut spec = SpawnSpec::new("env-test", "sh");
    spec.args = vec!["-c".into(), "printf '%s' \"$GREETING\"; pwd".into()];
    spec.env.insert("GREETING".into(), "salve".into());
    spec.project_path = dir.path().to_path_buf();

    let mut spawned = spawn_child(&spec, Arc::clone(&stdout), stderr).unwrap();
    spawned.child.wait().await.unwrap();

    assert!(
        wait_until(|| {
            let data = String::from_utf8_lossy(&stdout.read().data).into_owned();
            data.starts_with("salve") && data.contains(dir.path().file_name().unwrap().to_str().unwrap())
        })
        .await
    );
}

#[tokio::test]
async fn missing_binary_errors() {
    let (stdout, stderr) = rings();
    let spec = SpawnSpec::new("ghost", "definitely-not-a-real-binary-48151623");
    assert!(spawn_child(&spec, stdout, stderr).is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn child_is_its_own_group_leader() {
    let (stdout, stderr) = rings();
    let mut spec = SpawnSpec::new("group-test", "sh");
    spec.args = vec!["-c".into(), "sleep 5".into()];
    spec.project_path = std::env::temp_dir();

    let mut spawned = spawn_child(&spec, stdout, stderr).unwrap();
    let pgid = spawned.pgid.unwrap();
    assert_eq!(pgid, spawned.pid);

    // Killing the group takes the child down.
    crate::platform::kill_group(pgid, crate::platform::SIGKILL).unwrap();
    let status = spawned.child.wait().await.unwrap();
    assert!(!status.success());
}

#[cfg(unix)]
#[tokio::test]
async fn pty_multiplexes_into_stdout_ring() {
    let (stdout, stderr) = rings();
    let mut spec = SpawnSpec::new("pty-test", "sh");
    spec.args = vec!["-c".into(), "printf to-out; printf to-err >&2".into()];
    spec.project_path = std::env::temp_dir();
    spec.pty = true;

    let mut spawned = spawn_child(&spec, Arc::clone(&stdout), Arc::clone(&stderr)).unwrap();
    spawned.child.wait().await.unwrap();

    assert!(
        wait_until(|| {
            let data = String::from_utf8_lossy(&stdout.read().data).into_owned();
            data.contains("to-out") && data.contains("to-err")
        })
        .await
    );
    assert!(stderr.is_empty(), "pty merges both streams");
}
