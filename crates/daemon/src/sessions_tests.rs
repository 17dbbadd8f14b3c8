// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use parking_lot::Mutex as PlMutex;

/// Sink recording deliveries; `live` controls which conn ids accept.
#[derive(Default)]
struct FakeSink {
    live: PlMutex<Vec<u64>>,
    delivered: PlMutex<Vec<(u64, String, String)>>,
}

impl DeliverySink for FakeSink {
    fn deliver(&self, conn_id: u64, code: &str, message: &str) -> bool {
        if !self.live.lock().contains(&conn_id) {
            return false;
        }
        self.delivered.lock().push((conn_id, code.to_string(), message.to_string()));
        true
    }
}

fn store() -> (Arc<FakeSink>, SessionStore) {
    let sink = Arc::new(FakeSink::default());
    let store = SessionStore::new(Arc::<FakeSink>::clone(&sink));
    (sink, store)
}

#[test]
fn ensure_is_idempotent() {
    let (_sink, store) = store();
    let a = store.ensure("k3xv9p", "/work".into());
    let b = store.ensure("k3xv9p", "/elsewhere".into());
    assert_eq!(a.created_at_ms, b.created_at_ms);
    assert_eq!(store.list().len(), 1);
}

#[test]
fn send_to_unknown_session_errors() {
    let (_sink, store) = store();
    assert!(matches!(store.send("ghost", "hi"), Err(SessionError::NotFound(_))));
}

#[test]
fn attached_channel_receives_directly() {
    let (sink, store) = store();
    store.ensure("abc", "/w".into());
    sink.live.lock().push(7);
    store.attach("abc", 7).unwrap();

    assert_eq!(store.send("abc", "msg-1").unwrap(), SendOutcome::Delivered);
    let delivered = sink.delivered.lock();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0], (7, "abc".to_string(), "msg-1".to_string()));
}

#[test]
fn unattached_sends_buffer_and_flush_on_attach() {
    let (sink, store) = store();
    store.ensure("abc", "/w".into());

    assert_eq!(store.send("abc", "early-1").unwrap(), SendOutcome::Buffered);
    assert_eq!(store.send("abc", "early-2").unwrap(), SendOutcome::Buffered);

    sink.live.lock().push(3);
    let flushed = store.attach("abc", 3).unwrap();
    assert_eq!(flushed, 2);
    assert_eq!(sink.delivered.lock().len(), 2);
}

#[test]
fn buffer_drops_oldest_beyond_cap() {
    let (_sink, store) = store();
    store.ensure("abc", "/w".into());

    for i in 0..SESSION_BUFFER_CAP {
        assert_eq!(store.send("abc", &format!("m{i}")).unwrap(), SendOutcome::Buffered);
    }
    assert_eq!(
        store.send("abc", "overflow").unwrap(),
        SendOutcome::BufferedDroppedOldest
    );
}

#[test]
fn dead_channel_falls_back_to_buffer_and_detaches() {
    let (sink, store) = store();
    store.ensure("abc", "/w".into());
    // Conn 9 never marked live: delivery fails.
    store.attach("abc", 9).unwrap();

    assert_eq!(store.send("abc", "msg").unwrap(), SendOutcome::Buffered);
    assert!(!store.is_attached("abc"), "dead channel must be cleared");
    assert!(sink.delivered.lock().is_empty());
}

#[test]
fn detach_conn_clears_only_that_connection() {
    let (sink, store) = store();
    store.ensure("one", "/w".into());
    store.ensure("two", "/w".into());
    sink.live.lock().extend([1, 2]);
    store.attach("one", 1).unwrap();
    store.attach("two", 2).unwrap();

    store.detach_conn(1);
    assert!(!store.is_attached("one"));
    assert!(store.is_attached("two"));
}

#[test]
fn attach_replaces_previous_channel() {
    let (sink, store) = store();
    store.ensure("abc", "/w".into());
    sink.live.lock().extend([1, 2]);
    store.attach("abc", 1).unwrap();
    store.attach("abc", 2).unwrap();

    store.send("abc", "msg").unwrap();
    assert_eq!(sink.delivered.lock().last().unwrap().0, 2);
}
