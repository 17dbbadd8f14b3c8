// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Overlay banner configuration for proxied text responses.

use serde::{Deserialize, Serialize};

/// Responses larger than this never get an overlay.
pub const DEFAULT_OVERLAY_SIZE_CAP: usize = 512 * 1024;

/// A banner string prepended to matching text response bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    pub banner: String,
    /// Bodies above this size skip the overlay.
    #[serde(default = "default_size_cap")]
    pub size_cap: usize,
}

fn default_size_cap() -> usize {
    DEFAULT_OVERLAY_SIZE_CAP
}

impl OverlayConfig {
    pub fn new(banner: impl Into<String>) -> Self {
        Self { banner: banner.into(), size_cap: DEFAULT_OVERLAY_SIZE_CAP }
    }

    /// Whether a body of `body_len` bytes should receive the overlay.
    pub fn applies_to(&self, body_len: usize) -> bool {
        body_len <= self.size_cap
    }
}
