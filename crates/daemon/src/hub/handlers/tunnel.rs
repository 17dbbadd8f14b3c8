// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `TUNNEL` — public tunnel supervision.
//!
//! ```text
//! TUNNEL START <provider> <proxy-id>
//! TUNNEL STOP <tunnel-id>
//! TUNNEL STATUS <tunnel-id>
//! TUNNEL LIST
//! ```

use agnt_wire::Reply;
use async_trait::async_trait;

use super::{json_field, split_args, usage, HandlerCtx, VerbHandler};
use crate::tunnel::TunnelProvider;

pub struct TunnelHandler;

#[async_trait]
impl VerbHandler for TunnelHandler {
    async fn handle(&self, ctx: HandlerCtx<'_>, sub: Option<&str>, args: &[String]) -> Reply {
        let (positional, _options) = split_args(args);
        match sub {
            Some("START") => {
                let [provider, proxy_id] = positional[..] else {
                    return usage("TUNNEL START <provider> <proxy-id>");
                };
                let Some(provider) = TunnelProvider::parse(provider) else {
                    return usage(format!("unknown tunnel provider: {provider}"));
                };
                match ctx.hub.tunnels.start(provider, proxy_id) {
                    Ok(info) => Reply::ok(vec![info.tunnel_id, info.process_id]),
                    Err(e) => Reply::err(e.kind(), e.to_string()),
                }
            }
            Some("STOP") => {
                let [tunnel_id] = positional[..] else {
                    return usage("TUNNEL STOP <tunnel-id>");
                };
                match ctx.hub.tunnels.stop(tunnel_id).await {
                    Ok(()) => Reply::ok(vec![tunnel_id.to_string(), "stopped".to_string()]),
                    Err(e) => Reply::err(e.kind(), e.to_string()),
                }
            }
            Some("STATUS") => {
                let [tunnel_id] = positional[..] else {
                    return usage("TUNNEL STATUS <tunnel-id>");
                };
                match ctx.hub.tunnels.get(tunnel_id) {
                    Ok(entry) => Reply::ok(vec![json_field(&entry)]),
                    Err(e) => Reply::err(e.kind(), e.to_string()),
                }
            }
            Some("LIST") => {
                let entries = ctx.hub.tunnels.list();
                for entry in &entries {
                    ctx.conn.stream_event("tunnel", vec![json_field(entry)]).await;
                }
                Reply::ok(vec![entries.len().to_string()])
            }
            _ => usage("unknown TUNNEL sub-verb"),
        }
    }
}
