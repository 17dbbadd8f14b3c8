// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::message::Request;
use agnt_core::ErrorKind;

fn registry() -> Registry<&'static str> {
    let mut reg = Registry::new();
    reg.register("PING", &[], "ping").unwrap();
    reg.register("PROC", &["START", "STOP"], "proc").unwrap();
    reg
}

#[test]
fn resolves_bare_verb() {
    let reg = registry();
    let req = Request::new("PING", vec![]);
    let dispatch = reg.resolve(&req).unwrap();
    assert_eq!(*dispatch.handler, "ping");
    assert_eq!(dispatch.subverb, None);
    assert!(dispatch.args.is_empty());
}

#[test]
fn resolves_subverb_and_splits_args() {
    let reg = registry();
    let req = Request::new("PROC", vec!["START".into(), "web".into(), "npm".into()]);
    let dispatch = reg.resolve(&req).unwrap();
    assert_eq!(dispatch.subverb, Some("START"));
    assert_eq!(dispatch.args, ["web".to_string(), "npm".to_string()]);
}

#[test]
fn unknown_verb_maps_to_not_found() {
    let reg = registry();
    let err = reg.resolve(&Request::new("NOPE", vec![])).unwrap_err();
    assert_eq!(err, RegistryError::UnknownVerb("NOPE".into()));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn unknown_subverb_rejected_without_handler_invocation() {
    let reg = registry();
    let err = reg.resolve(&Request::new("PROC", vec!["EXPLODE".into()])).unwrap_err();
    assert!(matches!(err, RegistryError::UnknownSubVerb { .. }));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn missing_subverb_is_a_usage_error() {
    let reg = registry();
    let err = reg.resolve(&Request::new("PROC", vec![])).unwrap_err();
    assert!(matches!(err, RegistryError::MissingSubVerb { .. }));
    assert_eq!(err.kind(), ErrorKind::Usage);
}

#[test]
fn duplicate_registration_fails() {
    let mut reg = registry();
    let err = reg.register("PING", &[], "again").unwrap_err();
    assert_eq!(err, RegistryError::Duplicate("PING".into()));
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
}

#[test]
fn dynamic_layering_adds_verbs_later() {
    let mut reg = registry();
    assert!(!reg.contains("CHAOS"));
    reg.register("CHAOS", &["ENABLE"], "chaos").unwrap();
    assert!(reg.contains("CHAOS"));
    assert_eq!(reg.verbs(), vec!["CHAOS", "PING", "PROC"]);
}
