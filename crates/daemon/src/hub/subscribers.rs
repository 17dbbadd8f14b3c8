// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection event fan-out.
//!
//! Each live connection registers its outbound side here along with its
//! subscription set. Fanned-out events go through a bounded queue and
//! never block: a connection whose queue is full simply misses the event.
//! Replies travel a separate reserved channel (see `send_reply`) so event
//! pressure can never drop a request's terminal response.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use agnt_wire::Reply;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::sessions::DeliverySink;

/// Outbound side of a connection, shared with the fan-out table.
pub struct ConnectionShared {
    pub id: u64,
    /// Reserved for replies and handler-streamed result events.
    resp_tx: mpsc::Sender<String>,
    /// Fan-out queue; overflow drops the event, not the connection.
    event_tx: mpsc::Sender<String>,
    subscriptions: Mutex<HashSet<String>>,
}

impl ConnectionShared {
    pub fn new(id: u64, resp_tx: mpsc::Sender<String>, event_tx: mpsc::Sender<String>) -> Self {
        Self { id, resp_tx, event_tx, subscriptions: Mutex::new(HashSet::new()) }
    }

    /// Queue a terminal reply. Waits for space instead of dropping; false
    /// only when the connection is gone.
    pub async fn send_reply(&self, reply: &Reply) -> bool {
        self.resp_tx.send(reply.encode()).await.is_ok()
    }

    /// Stream one `EVENT` line as part of a response exchange. Shares the
    /// reply channel so streamed results stay ordered ahead of their
    /// terminal reply.
    pub async fn stream_event(&self, kind: &str, args: Vec<String>) -> bool {
        self.resp_tx.send(Reply::event(kind, args).encode()).await.is_ok()
    }

    /// Queue a fanned-out line; false when the connection is gone or the
    /// event queue is full.
    pub fn try_push(&self, line: String) -> bool {
        self.event_tx.try_send(line).is_ok()
    }

    pub fn push_event(&self, kind: &str, args: Vec<String>) -> bool {
        self.try_push(Reply::event(kind, args).encode())
    }

    pub fn subscribe(&self, key: &str) {
        self.subscriptions.lock().insert(key.to_string());
    }

    /// Returns false when the key was not subscribed.
    pub fn unsubscribe(&self, key: &str) -> bool {
        self.subscriptions.lock().remove(key)
    }

    pub fn is_subscribed(&self, key: &str) -> bool {
        self.subscriptions.lock().contains(key)
    }
}

/// Registry of live connections for pushed events.
#[derive(Default)]
pub struct Subscribers {
    conns: Mutex<HashMap<u64, Arc<ConnectionShared>>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, conn: Arc<ConnectionShared>) {
        self.conns.lock().insert(conn.id, conn);
    }

    pub fn remove(&self, conn_id: u64) {
        self.conns.lock().remove(&conn_id);
    }

    pub fn len(&self) -> usize {
        self.conns.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.lock().is_empty()
    }

    /// Push to every connection subscribed to `key`. Returns receivers.
    pub fn publish(&self, key: &str, reply: &Reply) -> usize {
        let conns: Vec<Arc<ConnectionShared>> = self.conns.lock().values().cloned().collect();
        let line = reply.encode();
        let mut delivered = 0;
        for conn in conns {
            if conn.is_subscribed(key) && conn.try_push(line.clone()) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Traffic fan-out: a connection subscribed to both the specific
    /// proxy key and the wildcard still gets one copy.
    pub fn publish_traffic(&self, proxy_id: &str, reply: &Reply) -> usize {
        let key = format!("traffic:{proxy_id}");
        let conns: Vec<Arc<ConnectionShared>> = self.conns.lock().values().cloned().collect();
        let line = reply.encode();
        let mut delivered = 0;
        for conn in conns {
            if (conn.is_subscribed(&key) || conn.is_subscribed("traffic:*"))
                && conn.try_push(line.clone())
            {
                delivered += 1;
            }
        }
        delivered
    }
}

impl DeliverySink for Subscribers {
    /// Session delivery: straight to the attached connection.
    fn deliver(&self, conn_id: u64, code: &str, message: &str) -> bool {
        let conn = { self.conns.lock().get(&conn_id).cloned() };
        match conn {
            Some(conn) => {
                conn.push_event("session", vec![code.to_string(), message.to_string()])
            }
            None => {
                debug!(conn_id, code, "session delivery target gone");
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "subscribers_tests.rs"]
mod tests;
