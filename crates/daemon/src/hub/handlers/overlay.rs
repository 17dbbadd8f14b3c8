// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `OVERLAY` — status banner control.
//!
//! ```text
//! OVERLAY SET <proxy-id> <banner> [cap=bytes]
//! OVERLAY GET <proxy-id>
//! OVERLAY CLEAR <proxy-id>
//! ```

use agnt_core::OverlayConfig;
use agnt_wire::Reply;
use async_trait::async_trait;

use super::{json_field, split_args, usage, HandlerCtx, VerbHandler};

pub struct OverlayHandler;

#[async_trait]
impl VerbHandler for OverlayHandler {
    async fn handle(&self, ctx: HandlerCtx<'_>, sub: Option<&str>, args: &[String]) -> Reply {
        let (positional, options) = split_args(args);
        let Some((&id, rest)) = positional.split_first() else {
            return usage("OVERLAY <sub> <proxy-id>");
        };
        let instance = match ctx.hub.proxies.get(id) {
            Ok(instance) => instance,
            Err(e) => return Reply::err(e.kind(), e.to_string()),
        };

        let reply = match sub {
            Some("SET") => {
                let [banner] = rest else {
                    return usage("OVERLAY SET <proxy-id> <banner>");
                };
                let mut config = OverlayConfig::new(*banner);
                if let Some(raw) = options.get("cap") {
                    match raw.parse::<usize>() {
                        Ok(cap) => config.size_cap = cap,
                        Err(_) => return usage(format!("bad cap: {raw}")),
                    }
                }
                instance.set_overlay(Some(config));
                Reply::ok(vec![id.to_string(), "set".to_string()])
            }
            Some("GET") => {
                let status = serde_json::json!({
                    "proxy_id": id,
                    "overlay": instance.overlay_config(),
                });
                return Reply::ok(vec![json_field(&status)]);
            }
            Some("CLEAR") => {
                instance.set_overlay(None);
                Reply::ok(vec![id.to_string(), "cleared".to_string()])
            }
            _ => return usage("unknown OVERLAY sub-verb"),
        };
        ctx.hub.saver.request_save();
        reply
    }
}
