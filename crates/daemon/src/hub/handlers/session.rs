// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `SESSION` — tool-server session access.
//!
//! ```text
//! SESSION LIST
//! SESSION GET <code> [attach=true] [cwd=path]
//! SESSION SEND <code> <message>
//! ```
//!
//! `attach=true` creates the session when absent, claims this connection
//! as its delivery channel, and flushes any buffered messages as
//! `EVENT session <code> <message>` lines.

use std::path::PathBuf;

use agnt_core::ErrorKind;
use agnt_wire::Reply;
use async_trait::async_trait;

use super::{json_field, split_args, usage, HandlerCtx, VerbHandler};
use crate::sessions::SendOutcome;

pub struct SessionHandler;

#[async_trait]
impl VerbHandler for SessionHandler {
    async fn handle(&self, ctx: HandlerCtx<'_>, sub: Option<&str>, args: &[String]) -> Reply {
        let (positional, options) = split_args(args);
        match sub {
            Some("LIST") => {
                let sessions = ctx.hub.sessions.list();
                for session in &sessions {
                    ctx.conn.stream_event("session_info", vec![json_field(session)]).await;
                }
                Reply::ok(vec![sessions.len().to_string()])
            }
            Some("GET") => {
                let [code] = positional[..] else {
                    return usage("SESSION GET <code>");
                };
                if options.get("attach") == Some(&"true") {
                    let cwd = options
                        .get("cwd")
                        .map(PathBuf::from)
                        .unwrap_or_else(|| PathBuf::from("."));
                    let session = ctx.hub.sessions.ensure(code, cwd);
                    let flushed = match ctx.hub.sessions.attach(code, ctx.conn.id) {
                        Ok(flushed) => flushed,
                        Err(e) => return Reply::err(ErrorKind::NotFound, e.to_string()),
                    };
                    let detail = serde_json::json!({
                        "session": session,
                        "attached": true,
                        "flushed": flushed,
                    });
                    return Reply::ok(vec![json_field(&detail)]);
                }
                match ctx.hub.sessions.get(code) {
                    Some(session) => Reply::ok(vec![json_field(&session)]),
                    None => {
                        Reply::err(ErrorKind::NotFound, format!("no such session: {code}"))
                    }
                }
            }
            Some("SEND") => {
                let [code, message] = positional[..] else {
                    return usage("SESSION SEND <code> <message>");
                };
                match ctx.hub.sessions.send(code, message) {
                    Ok(SendOutcome::Delivered) => {
                        Reply::ok(vec![code.to_string(), "delivered".to_string()])
                    }
                    Ok(SendOutcome::Buffered) => {
                        Reply::ok(vec![code.to_string(), "buffered".to_string()])
                    }
                    Ok(SendOutcome::BufferedDroppedOldest) => {
                        Reply::ok(vec![code.to_string(), "buffered_dropped_oldest".to_string()])
                    }
                    Err(e) => Reply::err(ErrorKind::NotFound, e.to_string()),
                }
            }
            _ => usage("unknown SESSION sub-verb"),
        }
    }
}
