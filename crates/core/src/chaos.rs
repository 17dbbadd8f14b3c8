// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chaos injection configuration.
//!
//! Applied per proxy, pre-forward. The proxy crate owns the sampling; this
//! is just the persisted shape plus the preset table.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fault-injection settings for a proxy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChaosConfig {
    /// Fixed latency added to every request.
    #[serde(default)]
    pub latency_ms: u64,
    /// Uniform jitter added on top of `latency_ms`.
    #[serde(default)]
    pub latency_jitter_ms: u64,
    /// Probability in [0, 1] that a request is dropped outright.
    #[serde(default)]
    pub drop_probability: f64,
    /// Path prefix -> forced status code.
    #[serde(default)]
    pub status_overrides: HashMap<String, u16>,
}

impl ChaosConfig {
    /// Recognized option keys for `CHAOS SET key=value`.
    pub const OPTION_KEYS: [&'static str; 4] =
        ["latency_ms", "latency_jitter_ms", "drop_probability", "status_overrides"];

    /// Apply a `key=value` option. Unknown keys and unparsable values error.
    pub fn set_option(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "latency_ms" => {
                self.latency_ms = value.parse().map_err(|_| format!("bad latency_ms: {value}"))?
            }
            "latency_jitter_ms" => {
                self.latency_jitter_ms =
                    value.parse().map_err(|_| format!("bad latency_jitter_ms: {value}"))?
            }
            "drop_probability" => {
                let p: f64 =
                    value.parse().map_err(|_| format!("bad drop_probability: {value}"))?;
                if !(0.0..=1.0).contains(&p) {
                    return Err(format!("drop_probability out of range: {value}"));
                }
                self.drop_probability = p;
            }
            "status_overrides" => {
                // "path=code,path=code"
                for pair in value.split(',').filter(|p| !p.is_empty()) {
                    let (path, code) =
                        pair.split_once('=').ok_or_else(|| format!("bad override: {pair}"))?;
                    let code: u16 =
                        code.parse().map_err(|_| format!("bad status code: {code}"))?;
                    self.status_overrides.insert(path.to_string(), code);
                }
            }
            _ => return Err(format!("unknown chaos option: {key}")),
        }
        Ok(())
    }
}

/// Named shortcut configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChaosPreset {
    /// High fixed latency, mild jitter.
    Slow,
    /// Moderate latency with a 10% drop rate.
    Flaky,
    /// Everything dropped.
    Offline,
}

impl ChaosPreset {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "slow" => Some(ChaosPreset::Slow),
            "flaky" => Some(ChaosPreset::Flaky),
            "offline" => Some(ChaosPreset::Offline),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChaosPreset::Slow => "slow",
            ChaosPreset::Flaky => "flaky",
            ChaosPreset::Offline => "offline",
        }
    }

    pub fn config(self) -> ChaosConfig {
        match self {
            ChaosPreset::Slow => ChaosConfig {
                latency_ms: 2_000,
                latency_jitter_ms: 500,
                ..ChaosConfig::default()
            },
            ChaosPreset::Flaky => ChaosConfig {
                latency_ms: 300,
                latency_jitter_ms: 300,
                drop_probability: 0.1,
                ..ChaosConfig::default()
            },
            ChaosPreset::Offline => {
                ChaosConfig { drop_probability: 1.0, ..ChaosConfig::default() }
            }
        }
    }
}

#[cfg(test)]
#[path = "chaos_tests.rs"]
mod tests;
