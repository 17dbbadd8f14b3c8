// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::sessions::DeliverySink;
use agnt_core::FakeClock;

struct NullSink;

impl DeliverySink for NullSink {
    fn deliver(&self, _conn_id: u64, _code: &str, _message: &str) -> bool {
        false
    }
}

fn fixture() -> (tempfile::TempDir, Arc<SessionStore>, FakeClock) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SessionStore::new(Arc::new(NullSink)));
    (dir, store, FakeClock::new())
}

fn scheduler(
    dir: &tempfile::TempDir,
    store: &Arc<SessionStore>,
    clock: &FakeClock,
) -> Scheduler<FakeClock> {
    Scheduler::load(dir.path().join("scheduler.json"), Arc::clone(store), clock.clone())
}

#[test]
fn future_tasks_do_not_fire() {
    let (dir, store, clock) = fixture();
    store.ensure("abc", "/w".into());
    let sched = scheduler(&dir, &store, &clock);

    sched.add("abc", "later", clock.epoch_ms() + 5_000);
    assert_eq!(sched.tick(), 0);
    assert_eq!(sched.list(None)[0].state, TaskState::Pending);
}

#[test]
fn due_tasks_deliver_within_one_tick() {
    let (dir, store, clock) = fixture();
    store.ensure("abc", "/w".into());
    let sched = scheduler(&dir, &store, &clock);

    let task = sched.add("abc", "now", clock.epoch_ms());
    assert_eq!(sched.tick(), 1);
    assert_eq!(sched.get(task.id.as_str()).unwrap().state, TaskState::Delivered);
}

#[test]
fn empty_tick_is_a_noop() {
    let (dir, store, clock) = fixture();
    let sched = scheduler(&dir, &store, &clock);
    assert_eq!(sched.tick(), 0);
}

#[test]
fn missing_session_walks_the_retry_ladder() {
    let (dir, store, clock) = fixture();
    let sched = scheduler(&dir, &store, &clock);

    let task = sched.add("no-such-session", "msg", clock.epoch_ms());

    // Attempt 1 fails; retry in 1s.
    sched.tick();
    let after = sched.get(task.id.as_str()).unwrap();
    assert_eq!(after.state, TaskState::Pending);
    assert_eq!(after.attempts, 1);
    assert_eq!(after.deliver_at_ms, clock.epoch_ms() + 1_000);

    // Not due again until the backoff passes.
    sched.tick();
    assert_eq!(sched.get(task.id.as_str()).unwrap().attempts, 1);

    clock.advance(std::time::Duration::from_millis(1_000));
    sched.tick();
    assert_eq!(sched.get(task.id.as_str()).unwrap().attempts, 2);

    clock.advance(std::time::Duration::from_millis(5_000));
    sched.tick();
    let dead = sched.get(task.id.as_str()).unwrap();
    assert_eq!(dead.state, TaskState::Failed);
    assert_eq!(dead.attempts, 3);
}

#[test]
fn session_appearing_before_retry_saves_the_task() {
    let (dir, store, clock) = fixture();
    let sched = scheduler(&dir, &store, &clock);

    let task = sched.add("late-session", "msg", clock.epoch_ms());
    sched.tick();
    assert_eq!(sched.get(task.id.as_str()).unwrap().state, TaskState::Pending);

    store.ensure("late-session", "/w".into());
    clock.advance(std::time::Duration::from_millis(1_000));
    sched.tick();
    assert_eq!(sched.get(task.id.as_str()).unwrap().state, TaskState::Delivered);
}

#[test]
fn cancel_pending_task() {
    let (dir, store, clock) = fixture();
    store.ensure("abc", "/w".into());
    let sched = scheduler(&dir, &store, &clock);

    let task = sched.add("abc", "msg", clock.epoch_ms() + 60_000);
    sched.cancel(task.id.as_str()).unwrap();
    assert_eq!(sched.get(task.id.as_str()).unwrap().state, TaskState::Cancelled);

    // Cancelled tasks never fire.
    clock.advance(std::time::Duration::from_secs(120));
    assert_eq!(sched.tick(), 0);
}

#[test]
fn cancel_is_rejected_on_terminal_tasks() {
    let (dir, store, clock) = fixture();
    store.ensure("abc", "/w".into());
    let sched = scheduler(&dir, &store, &clock);

    let task = sched.add("abc", "msg", clock.epoch_ms());
    sched.tick();
    assert!(matches!(
        sched.cancel(task.id.as_str()),
        Err(SchedulerError::Terminal("delivered"))
    ));
    assert!(matches!(sched.cancel("tsk-nope"), Err(SchedulerError::NotFound(_))));
}

#[test]
fn downtime_replay_fires_overdue_tasks_on_first_tick() {
    let (dir, store, clock) = fixture();
    store.ensure("abc", "/w".into());

    // First daemon run: schedule and "crash" before firing.
    {
        let sched = scheduler(&dir, &store, &clock);
        sched.add("abc", "survive-me", clock.epoch_ms() + 2_000);
    }

    // Downtime passes.
    clock.advance(std::time::Duration::from_secs(5));

    // Restart: task rehydrates and fires on the first tick.
    let sched = scheduler(&dir, &store, &clock);
    let pending = sched.list(None);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].message, "survive-me");

    assert_eq!(sched.tick(), 1);
    assert_eq!(sched.list(None)[0].state, TaskState::Delivered);
}

#[test]
fn corrupt_file_is_quarantined() {
    let (dir, store, clock) = fixture();
    std::fs::write(dir.path().join("scheduler.json"), b"{broken").unwrap();

    let sched = scheduler(&dir, &store, &clock);
    assert!(sched.list(None).is_empty());
    assert!(dir.path().join("scheduler.json.corrupt").exists());
}

#[test]
fn unknown_schema_version_is_quarantined() {
    let (dir, store, clock) = fixture();
    std::fs::write(dir.path().join("scheduler.json"), br#"{"v": 99, "tasks": []}"#).unwrap();

    let sched = scheduler(&dir, &store, &clock);
    assert!(sched.list(None).is_empty());
    assert!(dir.path().join("scheduler.json.corrupt").exists());
}

#[test]
fn list_filters_by_session() {
    let (dir, store, clock) = fixture();
    store.ensure("one", "/w".into());
    store.ensure("two", "/w".into());
    let sched = scheduler(&dir, &store, &clock);

    sched.add("one", "a", clock.epoch_ms() + 100);
    sched.add("two", "b", clock.epoch_ms() + 200);

    assert_eq!(sched.list(Some("one")).len(), 1);
    assert_eq!(sched.list(None).len(), 2);
}
