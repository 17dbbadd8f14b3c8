// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chaos sampling: decide per request, pre-forward.

use std::time::Duration;

use agnt_core::ChaosConfig;
use rand::Rng;

/// What chaos decided for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChaosOutcome {
    /// Forward normally (after any latency already slept).
    Continue,
    /// Pretend the network ate the request.
    Drop,
    /// Short-circuit with this status, skipping the upstream.
    Status(u16),
}

/// Sample the config for a request path. Sleeps the configured latency
/// (plus jitter) before returning.
pub async fn apply(config: &ChaosConfig, path: &str) -> ChaosOutcome {
    let latency = sample_latency(config);
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }

    if config.drop_probability > 0.0 && rand::rng().random_bool(config.drop_probability.min(1.0)) {
        return ChaosOutcome::Drop;
    }

    for (prefix, status) in &config.status_overrides {
        if path.starts_with(prefix.as_str()) {
            return ChaosOutcome::Status(*status);
        }
    }

    ChaosOutcome::Continue
}

fn sample_latency(config: &ChaosConfig) -> Duration {
    let jitter = if config.latency_jitter_ms > 0 {
        rand::rng().random_range(0..=config.latency_jitter_ms)
    } else {
        0
    };
    Duration::from_millis(config.latency_ms + jitter)
}
