// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn kind_names_roundtrip() {
    for kind in TrafficKind::ALL {
        assert_eq!(kind.as_str().parse::<TrafficKind>().unwrap(), kind);
    }
    assert!("bogus".parse::<TrafficKind>().is_err());
}

#[test]
fn there_are_fourteen_kinds() {
    assert_eq!(TrafficKind::ALL.len(), 14);
}

#[test]
fn droppable_and_critical_are_disjoint() {
    for kind in TrafficKind::ALL {
        assert!(!(kind.is_droppable() && kind.is_critical()), "{kind}");
    }
    assert!(TrafficKind::Mutation.is_droppable());
    assert!(TrafficKind::Execution.is_critical());
    assert!(TrafficKind::Response.is_critical());
}

#[test]
fn http_entry_exposes_url() {
    let entry = TrafficEntry::http(
        1,
        HttpPayload {
            method: "GET".into(),
            url: "http://localhost:3000/app".into(),
            status: 200,
            headers: vec![("content-type".into(), "text/html".into())],
            body: None,
            body_truncated: false,
            duration_ms: 12,
        },
    );
    assert_eq!(entry.url(), Some("http://localhost:3000/app"));
    assert!(!entry.as_http().unwrap().is_error());
}

#[test]
fn browser_entry_reads_url_from_json() {
    let entry = TrafficEntry::browser(
        2,
        TrafficKind::Error,
        None,
        json!({"url": "http://localhost:3000/x", "message": "boom"}),
    );
    assert_eq!(entry.url(), Some("http://localhost:3000/x"));
    assert!(entry.as_http().is_none());
}

#[test]
fn entry_serde_keeps_kind_tag() {
    let entry = TrafficEntry::browser(3, TrafficKind::DesignChat, Some("c-1".into()), json!({}));
    let text = serde_json::to_string(&entry).unwrap();
    assert!(text.contains("\"design_chat\""));
    let back: TrafficEntry = serde_json::from_str(&text).unwrap();
    assert_eq!(back.kind, TrafficKind::DesignChat);
    assert_eq!(back.correlation_id.as_deref(), Some("c-1"));
}

#[test]
fn body_truncation_caps_at_ten_kib() {
    let big = "a".repeat(HTTP_BODY_CAP + 100);
    let (body, truncated) = truncate_body(&big);
    assert_eq!(body.len(), HTTP_BODY_CAP);
    assert!(truncated);

    let (body, truncated) = truncate_body("small");
    assert_eq!(body, "small");
    assert!(!truncated);
}
