// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session store: code-addressed conduits to tool-server adapters.
//!
//! Sessions are created when an adapter attaches. A session has at most
//! one active delivery channel (a hub connection id); messages sent with
//! no channel attached buffer up to a small bound, oldest dropped first.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use agnt_core::{Clock, Session, SystemClock};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

/// Undelivered messages kept per session.
pub const SESSION_BUFFER_CAP: usize = 32;

/// Where attached messages actually go (the hub's subscriber table).
pub trait DeliverySink: Send + Sync {
    /// Push a session message to a connection. False when the connection
    /// is gone or no longer subscribed.
    fn deliver(&self, conn_id: u64, code: &str, message: &str) -> bool;
}

/// How a send was disposed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    Buffered,
    /// Buffered, evicting the oldest undelivered message.
    BufferedDroppedOldest,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no such session: {0}")]
    NotFound(String),
}

struct SessionRec {
    session: Session,
    channel: Option<u64>,
    buffer: VecDeque<String>,
}

/// Code -> session registry.
pub struct SessionStore {
    sink: Arc<dyn DeliverySink>,
    sessions: Mutex<HashMap<String, SessionRec>>,
}

impl SessionStore {
    pub fn new(sink: Arc<dyn DeliverySink>) -> Self {
        Self { sink, sessions: Mutex::new(HashMap::new()) }
    }

    /// Get or create a session record.
    pub fn ensure(&self, code: &str, project_path: PathBuf) -> Session {
        let mut sessions = self.sessions.lock();
        sessions
            .entry(code.to_string())
            .or_insert_with(|| SessionRec {
                session: Session::new(code, project_path, SystemClock.epoch_ms()),
                channel: None,
                buffer: VecDeque::new(),
            })
            .session
            .clone()
    }

    pub fn get(&self, code: &str) -> Option<Session> {
        self.sessions.lock().get(code).map(|rec| rec.session.clone())
    }

    pub fn list(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> =
            self.sessions.lock().values().map(|rec| rec.session.clone()).collect();
        sessions.sort_by(|a, b| a.code.cmp(&b.code));
        sessions
    }

    /// Whether a session has an attached delivery channel.
    pub fn is_attached(&self, code: &str) -> bool {
        self.sessions.lock().get(code).map(|rec| rec.channel.is_some()).unwrap_or(false)
    }

    /// Attach a connection as the session's delivery channel (replacing
    /// any previous one) and drain the buffer to it.
    pub fn attach(&self, code: &str, conn_id: u64) -> Result<usize, SessionError> {
        let buffered: Vec<String> = {
            let mut sessions = self.sessions.lock();
            let rec = sessions
                .get_mut(code)
                .ok_or_else(|| SessionError::NotFound(code.to_string()))?;
            rec.channel = Some(conn_id);
            rec.buffer.drain(..).collect()
        };
        let mut flushed = 0;
        for message in &buffered {
            if self.sink.deliver(conn_id, code, message) {
                flushed += 1;
            }
        }
        Ok(flushed)
    }

    /// Clear delivery channels owned by a closed connection.
    pub fn detach_conn(&self, conn_id: u64) {
        let mut sessions = self.sessions.lock();
        for rec in sessions.values_mut() {
            if rec.channel == Some(conn_id) {
                rec.channel = None;
            }
        }
    }

    /// Send a message to a session: to the live channel when attached,
    /// into the bounded buffer otherwise.
    pub fn send(&self, code: &str, message: &str) -> Result<SendOutcome, SessionError> {
        let channel = {
            let sessions = self.sessions.lock();
            let rec = sessions
                .get(code)
                .ok_or_else(|| SessionError::NotFound(code.to_string()))?;
            rec.channel
        };

        if let Some(conn_id) = channel {
            if self.sink.deliver(conn_id, code, message) {
                return Ok(SendOutcome::Delivered);
            }
            debug!(code, conn_id, "delivery channel gone, buffering");
        }

        let mut sessions = self.sessions.lock();
        let rec =
            sessions.get_mut(code).ok_or_else(|| SessionError::NotFound(code.to_string()))?;
        if channel.is_some() && rec.channel == channel {
            rec.channel = None;
        }
        let mut outcome = SendOutcome::Buffered;
        if rec.buffer.len() >= SESSION_BUFFER_CAP {
            rec.buffer.pop_front();
            outcome = SendOutcome::BufferedDroppedOldest;
        }
        rec.buffer.push_back(message.to_string());
        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
