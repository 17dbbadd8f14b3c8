// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded byte buffer for captured process output.
//!
//! One instance per stream (stdout and stderr are separate). Writers never
//! block: when a write would exceed capacity, the oldest bytes are evicted
//! and a truncation flag is raised for the next reader. Reads copy out a
//! consistent snapshot under the internal lock.

use parking_lot::Mutex;
use std::collections::VecDeque;

/// Default per-stream capacity (256 KiB).
pub const DEFAULT_RING_CAPACITY: usize = 256 * 1024;

/// A snapshot read from a [`RingBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingRead {
    /// Bytes currently held (at most `capacity`).
    pub data: Vec<u8>,
    /// Logical offset of the first returned byte since buffer creation.
    pub offset: u64,
    /// True when bytes were evicted before a reader saw them.
    pub truncated: bool,
}

struct Inner {
    buf: VecDeque<u8>,
    /// Total bytes ever written; `written - buf.len()` is the logical
    /// offset of the first byte still held.
    written: u64,
    truncated: bool,
}

/// Fixed-capacity byte ring with a sticky truncation flag.
pub struct RingBuffer {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner { buf: VecDeque::with_capacity(capacity), written: 0, truncated: false }),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_RING_CAPACITY)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append bytes, evicting the oldest when over capacity.
    ///
    /// Never blocks beyond the internal lock. Writes larger than the whole
    /// capacity keep only the trailing `capacity` bytes.
    pub fn write(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let mut inner = self.inner.lock();
        inner.written += data.len() as u64;

        let keep = if data.len() >= self.capacity {
            // The write alone fills the ring; everything held is evicted.
            if !inner.buf.is_empty() || data.len() > self.capacity {
                inner.truncated = true;
            }
            inner.buf.clear();
            &data[data.len() - self.capacity..]
        } else {
            let overflow = (inner.buf.len() + data.len()).saturating_sub(self.capacity);
            if overflow > 0 {
                inner.truncated = true;
                inner.buf.drain(..overflow);
            }
            data
        };
        inner.buf.extend(keep);
    }

    /// Snapshot of the full current contents.
    pub fn read(&self) -> RingRead {
        self.read_since(0)
    }

    /// Snapshot of contents at logical offset >= `offset`.
    ///
    /// Offsets count bytes since buffer creation, so a reader can poll with
    /// the previous `offset + data.len()` to receive only new bytes.
    pub fn read_since(&self, offset: u64) -> RingRead {
        let inner = self.inner.lock();
        let start = inner.written - inner.buf.len() as u64;
        let effective = offset.max(start);
        let skip = (effective - start) as usize;
        let data: Vec<u8> = if skip >= inner.buf.len() {
            Vec::new()
        } else {
            inner.buf.iter().skip(skip).copied().collect()
        };
        RingRead { data, offset: effective, truncated: inner.truncated }
    }

    /// Clear the truncation flag after a reader has observed it.
    pub fn ack_truncation(&self) {
        self.inner.lock().truncated = false;
    }

    /// Total bytes ever written.
    pub fn total_written(&self) -> u64 {
        self.inner.lock().written
    }

    /// Bytes currently held.
    pub fn len(&self) -> usize {
        self.inner.lock().buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().buf.is_empty()
    }
}

#[cfg(test)]
#[path = "ring_tests.rs"]
mod tests;
