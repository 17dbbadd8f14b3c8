// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic port derivation.
//!
//! Auto-assigned proxies hash their target URL into `[10000, 60000)` so
//! the same target lands on the same port across daemon restarts and
//! across machines.

use sha2::{Digest, Sha256};

pub const PORT_RANGE_START: u16 = 10_000;
pub const PORT_RANGE_LEN: u32 = 50_000;

/// Hash a target URL into the auto-assignment port range.
pub fn derive_port(target: &str) -> u16 {
    let digest = Sha256::digest(target.as_bytes());
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest[..8]);
    let h = u64::from_be_bytes(word);
    PORT_RANGE_START + (h % u64::from(PORT_RANGE_LEN)) as u16
}
