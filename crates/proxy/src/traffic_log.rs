// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-proxy circular traffic log.
//!
//! A fixed 1 000-entry window with strictly monotonic sequence numbers;
//! overwritten entries are gone. Queries filter by kind, URL substring,
//! time range, and paginate by sequence number.

use std::collections::HashMap;
use std::collections::VecDeque;

use agnt_core::{TrafficEntry, TrafficKind};
use parking_lot::Mutex;
use serde::Serialize;

use crate::TRAFFIC_LOG_CAPACITY;

/// Query parameters for [`TrafficLog::query`].
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    pub kind: Option<TrafficKind>,
    pub url_contains: Option<String>,
    pub from_ms: Option<u64>,
    pub to_ms: Option<u64>,
    /// Only entries with seq strictly greater than this.
    pub after_seq: Option<u64>,
    pub limit: Option<usize>,
}

/// Counts per kind plus the latest HTTP error.
#[derive(Debug, Clone, Serialize)]
pub struct LogSummary {
    pub counts: HashMap<TrafficKind, usize>,
    pub last_http_error: Option<TrafficEntry>,
}

/// Totals for `PROXYLOG STATS`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LogStats {
    pub appended: u64,
    pub evicted: u64,
    pub held: usize,
    pub first_seq: Option<u64>,
    pub last_seq: Option<u64>,
}

struct Inner {
    entries: VecDeque<TrafficEntry>,
    next_seq: u64,
    evicted: u64,
}

/// Bounded append-with-overwrite event log.
pub struct TrafficLog {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl TrafficLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                entries: VecDeque::with_capacity(capacity),
                next_seq: 1,
                evicted: 0,
            }),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(TRAFFIC_LOG_CAPACITY)
    }

    /// Assign the next sequence number and append, evicting the oldest
    /// entry at capacity. Returns the entry as stored.
    pub fn append(&self, mut entry: TrafficEntry) -> TrafficEntry {
        let mut inner = self.inner.lock();
        entry.seq = inner.next_seq;
        inner.next_seq += 1;
        if inner.entries.len() == self.capacity {
            inner.entries.pop_front();
            inner.evicted += 1;
        }
        inner.entries.push_back(entry.clone());
        entry
    }

    pub fn query(&self, query: &LogQuery) -> Vec<TrafficEntry> {
        let inner = self.inner.lock();
        let mut out: Vec<TrafficEntry> = inner
            .entries
            .iter()
            .filter(|e| query.kind.map(|k| e.kind == k).unwrap_or(true))
            .filter(|e| {
                query
                    .url_contains
                    .as_deref()
                    .map(|needle| e.url().map(|u| u.contains(needle)).unwrap_or(false))
                    .unwrap_or(true)
            })
            .filter(|e| query.from_ms.map(|t| e.at_ms >= t).unwrap_or(true))
            .filter(|e| query.to_ms.map(|t| e.at_ms <= t).unwrap_or(true))
            .filter(|e| query.after_seq.map(|s| e.seq > s).unwrap_or(true))
            .cloned()
            .collect();
        if let Some(limit) = query.limit {
            out.truncate(limit);
        }
        out
    }

    pub fn summary(&self) -> LogSummary {
        let inner = self.inner.lock();
        let mut counts: HashMap<TrafficKind, usize> = HashMap::new();
        let mut last_http_error = None;
        for entry in &inner.entries {
            *counts.entry(entry.kind).or_default() += 1;
            if entry.as_http().map(|h| h.is_error()).unwrap_or(false) {
                last_http_error = Some(entry.clone());
            }
        }
        LogSummary { counts, last_http_error }
    }

    pub fn stats(&self) -> LogStats {
        let inner = self.inner.lock();
        LogStats {
            appended: inner.next_seq - 1,
            evicted: inner.evicted,
            held: inner.entries.len(),
            first_seq: inner.entries.front().map(|e| e.seq),
            last_seq: inner.entries.back().map(|e| e.seq),
        }
    }

    /// Drop all entries. Sequence numbers keep counting.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let dropped = inner.entries.len() as u64;
        inner.evicted += dropped;
        inner.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}

#[cfg(test)]
#[path = "traffic_log_tests.rs"]
mod tests;
