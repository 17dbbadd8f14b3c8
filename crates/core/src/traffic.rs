// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed traffic log entries.
//!
//! Each proxy keeps a bounded log of these. HTTP entries are structured;
//! the browser-originated kinds carry their JSON payload verbatim, tagged
//! by kind. Sequence numbers are assigned by the log, not here.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// HTTP bodies are truncated to this many bytes at ingest.
pub const HTTP_BODY_CAP: usize = 10 * 1024;

/// The fourteen traffic entry kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficKind {
    Http,
    Error,
    Performance,
    Custom,
    Screenshot,
    Execution,
    Response,
    Interaction,
    Mutation,
    PanelMessage,
    Sketch,
    DesignState,
    DesignRequest,
    DesignChat,
}

impl TrafficKind {
    pub const ALL: [TrafficKind; 14] = [
        TrafficKind::Http,
        TrafficKind::Error,
        TrafficKind::Performance,
        TrafficKind::Custom,
        TrafficKind::Screenshot,
        TrafficKind::Execution,
        TrafficKind::Response,
        TrafficKind::Interaction,
        TrafficKind::Mutation,
        TrafficKind::PanelMessage,
        TrafficKind::Sketch,
        TrafficKind::DesignState,
        TrafficKind::DesignRequest,
        TrafficKind::DesignChat,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TrafficKind::Http => "http",
            TrafficKind::Error => "error",
            TrafficKind::Performance => "performance",
            TrafficKind::Custom => "custom",
            TrafficKind::Screenshot => "screenshot",
            TrafficKind::Execution => "execution",
            TrafficKind::Response => "response",
            TrafficKind::Interaction => "interaction",
            TrafficKind::Mutation => "mutation",
            TrafficKind::PanelMessage => "panel_message",
            TrafficKind::Sketch => "sketch",
            TrafficKind::DesignState => "design_state",
            TrafficKind::DesignRequest => "design_request",
            TrafficKind::DesignChat => "design_chat",
        }
    }

    /// Kinds that may be dropped from a full browser channel queue.
    pub fn is_droppable(self) -> bool {
        matches!(
            self,
            TrafficKind::Mutation | TrafficKind::Interaction | TrafficKind::Performance
        )
    }

    /// Kinds that must never be dropped (execution round-trips).
    pub fn is_critical(self) -> bool {
        matches!(self, TrafficKind::Execution | TrafficKind::Response)
    }
}

impl fmt::Display for TrafficKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrafficKind {
    type Err = UnknownTrafficKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrafficKind::ALL
            .iter()
            .find(|k| k.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownTrafficKind(s.to_string()))
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown traffic kind: {0}")]
pub struct UnknownTrafficKind(pub String);

/// Structured payload for `http` entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpPayload {
    pub method: String,
    pub url: String,
    pub status: u16,
    /// Subset of response headers worth keeping (content-type, length, ...).
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Body prefix, present only for text/JSON responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub body_truncated: bool,
    pub duration_ms: u64,
}

impl HttpPayload {
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// Entry payload: structured for HTTP, verbatim JSON for browser kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrafficPayload {
    Http(HttpPayload),
    Json(Value),
}

/// One traffic log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficEntry {
    pub seq: u64,
    pub at_ms: u64,
    pub kind: TrafficKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub payload: TrafficPayload,
}

impl TrafficEntry {
    /// Build an HTTP entry; seq is assigned on append.
    pub fn http(at_ms: u64, payload: HttpPayload) -> Self {
        Self { seq: 0, at_ms, kind: TrafficKind::Http, correlation_id: None, payload: TrafficPayload::Http(payload) }
    }

    /// Build an entry from a browser frame.
    pub fn browser(at_ms: u64, kind: TrafficKind, correlation_id: Option<String>, payload: Value) -> Self {
        Self { seq: 0, at_ms, kind, correlation_id, payload: TrafficPayload::Json(payload) }
    }

    /// URL associated with the entry, when any.
    pub fn url(&self) -> Option<&str> {
        match &self.payload {
            TrafficPayload::Http(h) => Some(&h.url),
            TrafficPayload::Json(v) => v.get("url").and_then(Value::as_str),
        }
    }

    pub fn as_http(&self) -> Option<&HttpPayload> {
        match &self.payload {
            TrafficPayload::Http(h) => Some(h),
            TrafficPayload::Json(_) => None,
        }
    }
}

/// Truncate a body to [`HTTP_BODY_CAP`] on a char boundary.
///
/// Returns the (possibly shortened) text and whether truncation happened.
pub fn truncate_body(body: &str) -> (String, bool) {
    if body.len() <= HTTP_BODY_CAP {
        return (body.to_string(), false);
    }
    let mut end = HTTP_BODY_CAP;
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    (body[..end].to_string(), true)
}

#[cfg(test)]
#[path = "traffic_tests.rs"]
mod tests;
