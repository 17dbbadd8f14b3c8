// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTML instrumentation injector.
//!
//! Inserts one `<script>` tag right after the opening `<head>` tag, or
//! before the first non-whitespace byte when no `<head>` exists. Only the
//! prefix needed to find the injection point is buffered; the rest of the
//! body streams through untouched.

use bytes::Bytes;

/// How much of the document we are willing to buffer while hunting for
/// the injection point.
pub const INJECT_SCAN_CAP: usize = 64 * 1024;

/// Builds the tag to inject and locates the injection point.
#[derive(Debug, Clone)]
pub struct HtmlInjector {
    tag: Vec<u8>,
}

impl HtmlInjector {
    /// Tag for a proxy. `public_url` switches the script source to the
    /// tunnel origin so pages served through it load the bundle from the
    /// same place.
    pub fn new(proxy_id: &str, script_path: &str, public_url: Option<&str>) -> Self {
        let src = match public_url {
            Some(origin) => format!("{}{}", origin.trim_end_matches('/'), script_path),
            None => script_path.to_string(),
        };
        let tag = format!(
            "<script src=\"{}\" data-proxy=\"{}\" defer></script>",
            src, proxy_id
        );
        Self { tag: tag.into_bytes() }
    }

    /// Number of bytes injection adds, for Content-Length rewriting.
    pub fn added_len(&self) -> usize {
        self.tag.len()
    }

    /// Inject into a fully buffered prefix (or whole document).
    ///
    /// Returns the rewritten bytes. The prefix must be everything received
    /// so far; callers stream the remainder unchanged afterwards.
    pub fn inject(&self, prefix: &[u8]) -> Bytes {
        let at = find_injection_point(prefix);
        let mut out = Vec::with_capacity(prefix.len() + self.tag.len());
        out.extend_from_slice(&prefix[..at]);
        out.extend_from_slice(&self.tag);
        out.extend_from_slice(&prefix[at..]);
        Bytes::from(out)
    }
}

/// Offset right after the `<head ...>` tag, else before the first
/// non-whitespace byte, else 0.
fn find_injection_point(html: &[u8]) -> usize {
    // Accept `<head>` and `<head lang=...>`, skip over `<header>`.
    let mut from = 0;
    while let Some(rel) = find_ci(&html[from..], b"<head") {
        let open = from + rel;
        let after = open + b"<head".len();
        match html.get(after) {
            Some(b'>') => return after + 1,
            Some(c) if c.is_ascii_whitespace() => {
                if let Some(close) = html[after..].iter().position(|&b| b == b'>') {
                    return after + close + 1;
                }
            }
            _ => {}
        }
        from = open + 1;
    }
    html.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(0)
}

/// Case-insensitive subslice search.
fn find_ci(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| {
        window
            .iter()
            .zip(needle.iter())
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
    })
}

/// Content-Type gate: inject only into HTML documents.
pub fn is_injectable_content_type(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("text/html"))
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "inject_tests.rs"]
mod tests;
