// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `PROXYLOG` — traffic log queries.
//!
//! ```text
//! PROXYLOG QUERY <proxy-id> [kind=http] [url=substr] [from=ms] [to=ms] [after=seq] [limit=N]
//! PROXYLOG SUMMARY <proxy-id>
//! PROXYLOG CLEAR <proxy-id>
//! PROXYLOG STATS <proxy-id>
//! ```

use std::collections::HashMap;

use agnt_core::TrafficKind;
use agnt_proxy::LogQuery;
use agnt_wire::Reply;
use async_trait::async_trait;

use super::{json_field, split_args, usage, HandlerCtx, VerbHandler};

pub struct ProxyLogHandler;

#[async_trait]
impl VerbHandler for ProxyLogHandler {
    async fn handle(&self, ctx: HandlerCtx<'_>, sub: Option<&str>, args: &[String]) -> Reply {
        let (positional, options) = split_args(args);
        let [id] = positional[..] else {
            return usage("PROXYLOG <sub> <proxy-id>");
        };
        let instance = match ctx.hub.proxies.get(id) {
            Ok(instance) => instance,
            Err(e) => return Reply::err(e.kind(), e.to_string()),
        };
        match sub {
            Some("QUERY") => {
                let query = match parse_query(&options) {
                    Ok(query) => query,
                    Err(reply) => return reply,
                };
                let entries = instance.traffic.query(&query);
                for entry in &entries {
                    ctx.conn.stream_event("proxylog", vec![json_field(entry)]).await;
                }
                Reply::ok(vec![entries.len().to_string()])
            }
            Some("SUMMARY") => Reply::ok(vec![json_field(&instance.traffic.summary())]),
            Some("STATS") => Reply::ok(vec![json_field(&instance.traffic.stats())]),
            Some("CLEAR") => {
                instance.traffic.clear();
                Reply::ok(vec![id.to_string(), "cleared".to_string()])
            }
            _ => usage("unknown PROXYLOG sub-verb"),
        }
    }
}

fn parse_query(options: &HashMap<&str, &str>) -> Result<LogQuery, Reply> {
    let mut query = LogQuery::default();
    if let Some(kind) = options.get("kind") {
        query.kind = Some(
            kind.parse::<TrafficKind>()
                .map_err(|_| usage(format!("unknown kind: {kind}")))?,
        );
    }
    query.url_contains = options.get("url").map(|s| s.to_string());
    query.from_ms = parse_u64(options, "from")?;
    query.to_ms = parse_u64(options, "to")?;
    query.after_seq = parse_u64(options, "after")?;
    query.limit = parse_u64(options, "limit")?.map(|n| n as usize);
    Ok(query)
}

fn parse_u64(options: &HashMap<&str, &str>, key: &str) -> Result<Option<u64>, Reply> {
    match options.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| usage(format!("bad {key}: {raw}"))),
    }
}
