// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::Arc;

#[test]
fn read_returns_written_bytes() {
    let ring = RingBuffer::new(16);
    ring.write(b"hello");
    let read = ring.read();
    assert_eq!(read.data, b"hello");
    assert_eq!(read.offset, 0);
    assert!(!read.truncated);
}

#[test]
fn write_at_exact_capacity_does_not_truncate() {
    let ring = RingBuffer::new(8);
    ring.write(b"12345678");
    let read = ring.read();
    assert_eq!(read.data, b"12345678");
    assert!(!read.truncated);
}

#[test]
fn overflow_evicts_oldest_and_sets_flag() {
    let ring = RingBuffer::new(8);
    ring.write(b"12345678");
    ring.write(b"AB");
    let read = ring.read();
    assert_eq!(read.data, b"345678AB");
    assert!(read.truncated);
    assert_eq!(read.offset, 2);
}

#[test]
fn oversized_single_write_keeps_tail() {
    let ring = RingBuffer::new(4);
    ring.write(b"abcdefgh");
    let read = ring.read();
    assert_eq!(read.data, b"efgh");
    assert!(read.truncated);
}

#[test]
fn truncation_flag_sticky_until_acked() {
    let ring = RingBuffer::new(4);
    ring.write(b"abcdefgh");
    assert!(ring.read().truncated);

    ring.write(b"ij");
    assert!(ring.read().truncated, "flag persists across reads");

    ring.ack_truncation();
    assert!(!ring.read().truncated);
}

#[test]
fn read_since_returns_only_new_bytes() {
    let ring = RingBuffer::new(64);
    ring.write(b"first");
    let first = ring.read();
    ring.write(b"second");

    let rest = ring.read_since(first.offset + first.data.len() as u64);
    assert_eq!(rest.data, b"second");
    assert_eq!(rest.offset, 5);
}

#[test]
fn read_since_clamps_to_evicted_start() {
    let ring = RingBuffer::new(4);
    ring.write(b"abcd");
    ring.write(b"efgh");
    // Offset 0 was evicted; the read clamps forward.
    let read = ring.read_since(0);
    assert_eq!(read.data, b"efgh");
    assert_eq!(read.offset, 4);
}

#[test]
fn read_since_past_end_is_empty() {
    let ring = RingBuffer::new(16);
    ring.write(b"abc");
    let read = ring.read_since(100);
    assert!(read.data.is_empty());
}

#[test]
fn large_write_then_small_write_matches_output_scenario() {
    // 1 MiB into a 256 KiB ring, then 10 more bytes.
    let ring = RingBuffer::with_default_capacity();
    let chunk = vec![b'x'; 1024];
    for _ in 0..1024 {
        ring.write(&chunk);
    }
    let read = ring.read();
    assert_eq!(read.data.len(), DEFAULT_RING_CAPACITY);
    assert!(read.truncated);

    ring.write(b"tail-bytes");
    let next = ring.read_since(read.offset + read.data.len() as u64);
    assert_eq!(next.data, b"tail-bytes");
    assert!(next.truncated, "still set until acknowledged");
}

proptest::proptest! {
    /// After writes totalling N bytes, read() holds at most `capacity`
    /// bytes and the flag is set iff N > capacity.
    #[test]
    fn truncation_iff_overflow(writes in proptest::collection::vec(
        proptest::collection::vec(proptest::prelude::any::<u8>(), 0..64),
        0..32,
    )) {
        let ring = RingBuffer::new(128);
        let total: usize = writes.iter().map(Vec::len).sum();
        let mut all = Vec::new();
        for w in &writes {
            ring.write(w);
            all.extend_from_slice(w);
        }
        let read = ring.read();
        proptest::prop_assert!(read.data.len() <= 128);
        proptest::prop_assert_eq!(read.truncated, total > 128);
        // Contents are always the trailing bytes of everything written.
        proptest::prop_assert_eq!(&read.data[..], &all[all.len() - read.data.len()..]);
    }
}

#[test]
fn concurrent_writers_and_readers() {
    let ring = Arc::new(RingBuffer::new(1024));
    let mut handles = Vec::new();
    for _ in 0..4 {
        let ring = Arc::clone(&ring);
        handles.push(std::thread::spawn(move || {
            for _ in 0..100 {
                ring.write(b"0123456789");
                let _ = ring.read();
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(ring.total_written(), 4 * 100 * 10);
    assert!(ring.len() <= 1024);
}
