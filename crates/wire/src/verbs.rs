// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The verb table: every verb the daemon speaks and its sub-verbs.
//!
//! Kept here so the client and the hub register from the same source.

/// `(verb, allowed sub-verbs)`; an empty slice means no sub-verb.
pub const VERBS: &[(&str, &[&str])] = &[
    ("HELLO", &[]),
    ("PING", &[]),
    ("PROC", &["START", "STOP", "STATUS", "LIST", "OUTPUT", "SIGNAL"]),
    ("PROXY", &["START", "STOP", "STATUS", "LIST", "EXEC", "TOAST"]),
    ("PROXYLOG", &["QUERY", "SUMMARY", "CLEAR", "STATS"]),
    ("TUNNEL", &["START", "STOP", "STATUS", "LIST"]),
    ("CHAOS", &["ENABLE", "DISABLE", "STATUS", "SET", "PRESET"]),
    ("CURRENTPAGE", &["LIST", "GET", "SUMMARY", "CLEAR"]),
    ("OVERLAY", &["SET", "GET", "CLEAR"]),
    ("SCHEDULE", &["ADD", "CANCEL", "LIST", "STATUS"]),
    ("SESSION", &["LIST", "GET", "SEND"]),
    ("SUBSCRIBE", &[]),
    ("UNSUBSCRIBE", &[]),
    ("DETECT", &[]),
    ("UPGRADE", &[]),
];

/// Sub-verbs for a verb, when it is in the table.
pub fn subverbs_for(verb: &str) -> Option<&'static [&'static str]> {
    VERBS.iter().find(|(v, _)| *v == verb).map(|(_, subs)| *subs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_the_protocol_surface() {
        for verb in ["HELLO", "PING", "PROC", "PROXY", "SCHEDULE", "DETECT", "UPGRADE"] {
            assert!(subverbs_for(verb).is_some(), "{verb} missing");
        }
        assert_eq!(subverbs_for("PROC").map(<[_]>::len), Some(6));
        assert!(subverbs_for("NOPE").is_none());
    }

    #[test]
    fn verbs_are_uppercase_and_unique() {
        let mut seen = std::collections::HashSet::new();
        for (verb, subs) in VERBS {
            assert!(verb.bytes().all(|b| b.is_ascii_uppercase()));
            assert!(seen.insert(*verb), "{verb} duplicated");
            for sub in *subs {
                assert!(sub.bytes().all(|b| b.is_ascii_uppercase()));
            }
        }
    }
}
