// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use agnt_core::ErrorKind;

#[test]
fn parse_simple_request() {
    let req = Request::parse("PING ;;").unwrap();
    assert_eq!(req.verb, "PING");
    assert!(req.args.is_empty());
}

#[test]
fn parse_request_with_subverb_and_args() {
    let req = Request::parse("PROC START web npm run%20dev ;;").unwrap();
    assert_eq!(req.verb, "PROC");
    assert_eq!(req.args, vec!["START", "web", "npm", "run dev"]);
}

#[test]
fn terminator_without_leading_space_accepted() {
    let req = Request::parse("PING;;").unwrap();
    assert_eq!(req.verb, "PING");
}

#[test]
fn missing_terminator_rejected() {
    assert!(matches!(Request::parse("PING"), Err(WireError::MissingTerminator(_))));
}

#[test]
fn lowercase_verb_rejected() {
    assert!(matches!(Request::parse("ping ;;"), Err(WireError::BadVerb(_))));
}

#[test]
fn empty_line_rejected() {
    assert!(matches!(Request::parse(" ;;"), Err(WireError::Empty)));
}

#[test]
fn request_encode_parse_roundtrip() {
    let req = Request::new(
        "PROXY",
        vec!["START".into(), "app".into(), "http://localhost:3000".into()],
    );
    let line = req.encode();
    assert!(line.ends_with(" ;;"));
    assert_eq!(Request::parse(&line).unwrap(), req);
}

#[test]
fn reply_ok_roundtrip() {
    let reply = Reply::ok(vec!["1".to_string(), "running".to_string()]);
    let back = Reply::parse(&reply.encode()).unwrap();
    assert_eq!(back, reply);
    assert!(back.is_terminal());
}

#[test]
fn reply_err_roundtrip_carries_kind_verbatim() {
    let reply = Reply::err(ErrorKind::NotFound, "no such proxy: app");
    let line = reply.encode();
    assert!(line.starts_with("ERR NOT_FOUND "));
    assert_eq!(Reply::parse(&line).unwrap(), reply);
}

#[test]
fn reply_err_without_message() {
    let line = "ERR VERSION_MISMATCH ;;";
    match Reply::parse(line).unwrap() {
        Reply::Err { kind, message } => {
            assert_eq!(kind, ErrorKind::VersionMismatch);
            assert!(message.is_empty());
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn reply_event_is_not_terminal() {
    let reply = Reply::event("traffic", vec!["app".into(), "{}".into()]);
    assert!(!reply.is_terminal());
    assert_eq!(Reply::parse(&reply.encode()).unwrap(), reply);
}

#[test]
fn unknown_error_kind_is_a_bad_reply() {
    assert!(matches!(Reply::parse("ERR EXPLODED oops ;;"), Err(WireError::BadReply(_))));
}

#[test]
fn unknown_head_token_is_a_bad_reply() {
    assert!(matches!(Reply::parse("WHAT 1 ;;"), Err(WireError::BadReply(_))));
}
