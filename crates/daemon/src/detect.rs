// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project-type detection for the `DETECT` verb.
//!
//! Heuristic order is part of the contract: Go, then Node, then Python,
//! first match wins.

use std::path::Path;

/// Detected project type, as reported on the wire.
pub fn detect_project(path: &Path) -> &'static str {
    if path.join("go.mod").is_file() {
        return "go";
    }
    if path.join("package.json").is_file() {
        return "node";
    }
    if path.join("pyproject.toml").is_file() || path.join("requirements.txt").is_file() {
        return "python";
    }
    "unknown"
}
