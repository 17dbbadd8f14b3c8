// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Browser channels: one per live metrics WebSocket.
//!
//! Each channel owns a bounded send queue. Overflow evicts the oldest
//! droppable event and records a truncation marker; critical frames
//! (execution round-trips) block briefly and close the channel when the
//! queue stays full.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Notify;
use tracing::warn;

use crate::CHANNEL_QUEUE_CAPACITY;

/// Producer deadline for critical frames against a full queue.
const CRITICAL_PUSH_DEADLINE: Duration = Duration::from_millis(500);

/// Page info reported by the instrumentation (for CURRENTPAGE).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageInfo {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub seen_at_ms: u64,
}

/// A frame queued toward the browser.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    pub kind: &'static str,
    pub correlation_id: Option<String>,
    pub payload: Value,
    droppable: bool,
}

impl OutboundFrame {
    pub fn execute(correlation_id: String, source: String) -> Self {
        Self {
            kind: "execute",
            correlation_id: Some(correlation_id),
            payload: json!({ "source": source }),
            droppable: false,
        }
    }

    pub fn toast(message: String, level: String) -> Self {
        Self {
            kind: "toast",
            correlation_id: None,
            payload: json!({ "message": message, "level": level }),
            droppable: true,
        }
    }

    pub fn event(kind: &'static str, payload: Value) -> Self {
        Self { kind, correlation_id: None, payload, droppable: true }
    }

    pub fn to_json(&self) -> String {
        let mut frame = json!({ "type": self.kind, "payload": self.payload });
        if let Some(ref cid) = self.correlation_id {
            frame["correlation_id"] = json!(cid);
        }
        frame.to_string()
    }
}

struct Queue {
    frames: VecDeque<OutboundFrame>,
    truncated: u64,
}

/// One connected browser.
pub struct BrowserChannel {
    pub id: String,
    queue: Mutex<Queue>,
    notify: Notify,
    capacity: usize,
    closed: AtomicBool,
    last_seen_ms: AtomicU64,
    page: Mutex<Option<PageInfo>>,
}

impl BrowserChannel {
    pub fn new(id: String) -> Self {
        Self {
            id,
            queue: Mutex::new(Queue { frames: VecDeque::new(), truncated: 0 }),
            notify: Notify::new(),
            capacity: CHANNEL_QUEUE_CAPACITY,
            closed: AtomicBool::new(false),
            last_seen_ms: AtomicU64::new(0),
            page: Mutex::new(None),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Mark closed and wake the drain task so it observes the flag.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    pub fn touch(&self, now_ms: u64) {
        self.last_seen_ms.store(now_ms, Ordering::Relaxed);
    }

    pub fn last_seen_ms(&self) -> u64 {
        self.last_seen_ms.load(Ordering::Relaxed)
    }

    pub fn set_page(&self, page: PageInfo) {
        *self.page.lock() = Some(page);
    }

    pub fn page(&self) -> Option<PageInfo> {
        self.page.lock().clone()
    }

    pub fn clear_page(&self) {
        *self.page.lock() = None;
    }

    /// Frames silently evicted so far.
    pub fn truncated_count(&self) -> u64 {
        self.queue.lock().truncated
    }

    /// Queue a droppable frame; full queues evict the oldest droppable
    /// entry (or, failing that, this frame).
    pub fn push(&self, frame: OutboundFrame) {
        if self.is_closed() {
            return;
        }
        let mut queue = self.queue.lock();
        if queue.frames.len() >= self.capacity {
            if let Some(at) = queue.frames.iter().position(|f| f.droppable) {
                queue.frames.remove(at);
            } else if frame.droppable {
                queue.truncated += 1;
                return;
            }
            queue.truncated += 1;
        }
        queue.frames.push_back(frame);
        drop(queue);
        self.notify.notify_one();
    }

    /// Queue a critical frame, waiting briefly for space. A queue still
    /// full at the deadline closes the channel (the browser is not
    /// draining) and the frame is reported undeliverable.
    pub async fn push_critical(&self, frame: OutboundFrame) -> Result<(), ChannelClosed> {
        let deadline = tokio::time::Instant::now() + CRITICAL_PUSH_DEADLINE;
        loop {
            if self.is_closed() {
                return Err(ChannelClosed);
            }
            {
                let mut queue = self.queue.lock();
                if queue.frames.len() < self.capacity {
                    queue.frames.push_back(frame);
                    drop(queue);
                    self.notify.notify_one();
                    return Ok(());
                }
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(channel = %self.id, "send queue stuck, closing browser channel");
                self.close();
                return Err(ChannelClosed);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Pop the next frame, waiting until one arrives or the channel closes.
    pub async fn pop(&self) -> Option<OutboundFrame> {
        loop {
            if let Some(frame) = self.queue.lock().frames.pop_front() {
                return Some(frame);
            }
            if self.is_closed() {
                return None;
            }
            self.notify.notified().await;
        }
    }
}

/// Error for undeliverable critical frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("browser channel closed")]
pub struct ChannelClosed;

/// The channels attached to one proxy.
#[derive(Default)]
pub struct ChannelSet {
    channels: Mutex<Vec<Arc<BrowserChannel>>>,
}

impl ChannelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, channel: Arc<BrowserChannel>) {
        self.channels.lock().push(channel);
    }

    pub fn detach(&self, id: &str) {
        let mut channels = self.channels.lock();
        if let Some(at) = channels.iter().position(|c| c.id == id) {
            let channel = channels.remove(at);
            channel.close();
        }
    }

    pub fn all(&self) -> Vec<Arc<BrowserChannel>> {
        self.channels.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.channels.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.lock().is_empty()
    }

    /// The channel to target for executions: most recently seen.
    pub fn most_recent(&self) -> Option<Arc<BrowserChannel>> {
        self.channels
            .lock()
            .iter()
            .filter(|c| !c.is_closed())
            .max_by_key(|c| c.last_seen_ms())
            .cloned()
    }

    /// Fan a droppable frame out to every live channel.
    pub fn broadcast(&self, frame: &OutboundFrame) {
        for channel in self.channels.lock().iter() {
            channel.push(frame.clone());
        }
    }

    /// Close everything and clear the set.
    pub fn close_all(&self) {
        let mut channels = self.channels.lock();
        for channel in channels.iter() {
            channel.close();
        }
        channels.clear();
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
