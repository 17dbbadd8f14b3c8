// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `SUBSCRIBE` / `UNSUBSCRIBE` — pushed-event opt-in.
//!
//! Keys: `traffic:<proxy-id>`, `traffic:*`, `proc_failed`, `proxy_failed`.

use agnt_core::ErrorKind;
use agnt_wire::Reply;
use async_trait::async_trait;

use super::{split_args, usage, HandlerCtx, VerbHandler};

pub struct SubscribeHandler {
    pub unsubscribe: bool,
}

#[async_trait]
impl VerbHandler for SubscribeHandler {
    async fn handle(&self, ctx: HandlerCtx<'_>, _sub: Option<&str>, args: &[String]) -> Reply {
        let (positional, _options) = split_args(args);
        let [key] = positional[..] else {
            return usage("SUBSCRIBE <event-key>");
        };
        if !valid_key(key) {
            return usage(format!("unknown event key: {key}"));
        }
        if self.unsubscribe {
            if ctx.conn.unsubscribe(key) {
                Reply::ok(vec![key.to_string(), "unsubscribed".to_string()])
            } else {
                Reply::err(ErrorKind::NotFound, format!("not subscribed: {key}"))
            }
        } else {
            ctx.conn.subscribe(key);
            Reply::ok(vec![key.to_string(), "subscribed".to_string()])
        }
    }
}

fn valid_key(key: &str) -> bool {
    key == "proc_failed"
        || key == "proxy_failed"
        || key == "traffic:*"
        || key.strip_prefix("traffic:").map(|id| !id.is_empty()).unwrap_or(false)
}
