// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

define_id! {
    /// Test-only id type.
    pub struct DemoId("dmo-");
}

#[test]
fn generated_ids_carry_prefix_and_differ() {
    let a = DemoId::new();
    let b = DemoId::new();
    assert!(a.as_str().starts_with("dmo-"));
    assert_ne!(a, b);
}

#[test]
fn from_string_preserves_value() {
    let id = DemoId::from_string("dmo-fixed");
    assert_eq!(id.as_str(), "dmo-fixed");
    assert_eq!(id, "dmo-fixed");
}

#[test]
fn serde_is_transparent() {
    let id = DemoId::from_string("dmo-x");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"dmo-x\"");
    let back: DemoId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn short_truncates_on_char_boundary() {
    assert_eq!(short("abcdef", 4), "abcd");
    assert_eq!(short("ab", 4), "ab");
    // Multi-byte char straddling the cut is dropped whole.
    assert_eq!(short("aé", 2), "a");
}

#[test]
fn session_codes_are_short_and_lowercase() {
    let code = session_code();
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
}
