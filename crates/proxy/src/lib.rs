// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! agnt-proxy: instrumenting reverse proxies.
//!
//! Each instance fronts one upstream target: it injects the browser
//! instrumentation into HTML, shims `/__devtool_metrics` into browser
//! channels, keeps a bounded traffic log, and optionally misbehaves on
//! purpose (chaos) or banners responses (overlay).

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod channel;
pub mod chaos;
pub mod inject;
pub mod instance;
pub mod manager;
pub mod ports;
pub mod traffic_log;
pub mod ws;

pub use channel::{BrowserChannel, ChannelSet, PageInfo};
pub use chaos::ChaosOutcome;
pub use inject::HtmlInjector;
pub use instance::{ProxyError, ProxyEvent, ProxyInstance, ProxySettings, EXEC_TIMEOUT};
pub use manager::{CreateParams, ProxyEntry, ProxyManager, ProxyRecord};
pub use ports::derive_port;
pub use traffic_log::{LogQuery, LogStats, LogSummary, TrafficLog};

/// Reserved WebSocket path on every proxy; never forwarded upstream.
pub const METRICS_PATH: &str = "/__devtool_metrics";

/// Reserved path serving the injected instrumentation bundle.
pub const SCRIPT_PATH: &str = "/__devtool_client.js";

/// Per-proxy traffic log capacity.
pub const TRAFFIC_LOG_CAPACITY: usize = 1_000;

/// Browser channel send queue capacity.
pub const CHANNEL_QUEUE_CAPACITY: usize = 256;
