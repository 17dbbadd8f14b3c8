// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire error taxonomy.
//!
//! Kinds are surfaced verbatim in `ERR <kind> <message>` lines, so their
//! wire names are part of the protocol contract and round-trip exactly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error kind carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Usage,
    NotFound,
    AlreadyExists,
    InvalidState,
    Cancelled,
    Timeout,
    VersionMismatch,
    UpstreamUnreachable,
    RateLimited,
    RaceTransition,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Usage => "USAGE",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::AlreadyExists => "ALREADY_EXISTS",
            ErrorKind::InvalidState => "INVALID_STATE",
            ErrorKind::Cancelled => "CANCELLED",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::VersionMismatch => "VERSION_MISMATCH",
            ErrorKind::UpstreamUnreachable => "UPSTREAM_UNREACHABLE",
            ErrorKind::RateLimited => "RATE_LIMITED",
            ErrorKind::RaceTransition => "RACE_TRANSITION",
            ErrorKind::Internal => "INTERNAL",
        }
    }

    pub const ALL: [ErrorKind; 11] = [
        ErrorKind::Usage,
        ErrorKind::NotFound,
        ErrorKind::AlreadyExists,
        ErrorKind::InvalidState,
        ErrorKind::Cancelled,
        ErrorKind::Timeout,
        ErrorKind::VersionMismatch,
        ErrorKind::UpstreamUnreachable,
        ErrorKind::RateLimited,
        ErrorKind::RaceTransition,
        ErrorKind::Internal,
    ];
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = UnknownErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorKind::ALL
            .iter()
            .find(|k| k.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownErrorKind(s.to_string()))
    }
}

/// Parse failure for an [`ErrorKind`] wire name.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown error kind: {0}")]
pub struct UnknownErrorKind(pub String);

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
