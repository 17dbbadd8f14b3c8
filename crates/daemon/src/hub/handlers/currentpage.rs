// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `CURRENTPAGE` — what the connected browsers are looking at.
//!
//! ```text
//! CURRENTPAGE LIST                 # every page across proxies
//! CURRENTPAGE GET <proxy-id>      # pages for one proxy
//! CURRENTPAGE SUMMARY             # counts per proxy
//! CURRENTPAGE CLEAR [proxy-id]    # forget stored page info
//! ```

use agnt_wire::Reply;
use async_trait::async_trait;
use serde::Serialize;

use super::{json_field, split_args, usage, HandlerCtx, VerbHandler};
use agnt_proxy::PageInfo;

#[derive(Serialize)]
struct PageRow {
    proxy_id: String,
    channel_id: String,
    #[serde(flatten)]
    page: PageInfo,
}

pub struct CurrentPageHandler;

#[async_trait]
impl VerbHandler for CurrentPageHandler {
    async fn handle(&self, ctx: HandlerCtx<'_>, sub: Option<&str>, args: &[String]) -> Reply {
        let (positional, _options) = split_args(args);
        match sub {
            Some("LIST") => {
                let rows = collect_pages(ctx.hub, None);
                for row in &rows {
                    ctx.conn.stream_event("currentpage", vec![json_field(row)]).await;
                }
                Reply::ok(vec![rows.len().to_string()])
            }
            Some("GET") => {
                let [id] = positional[..] else {
                    return usage("CURRENTPAGE GET <proxy-id>");
                };
                if let Err(e) = ctx.hub.proxies.get(id) {
                    return Reply::err(e.kind(), e.to_string());
                }
                let rows = collect_pages(ctx.hub, Some(id));
                Reply::ok(vec![json_field(&rows)])
            }
            Some("SUMMARY") => {
                let rows = collect_pages(ctx.hub, None);
                let mut counts = std::collections::HashMap::<String, usize>::new();
                for row in &rows {
                    *counts.entry(row.proxy_id.clone()).or_default() += 1;
                }
                let summary = serde_json::json!({
                    "pages": rows.len(),
                    "per_proxy": counts,
                });
                Reply::ok(vec![json_field(&summary)])
            }
            Some("CLEAR") => {
                let proxy_filter = positional.first().copied();
                let mut cleared = 0;
                for entry in ctx.hub.proxies.list(None, true) {
                    if proxy_filter.map(|f| f != entry.proxy_id).unwrap_or(false) {
                        continue;
                    }
                    if let Ok(instance) = ctx.hub.proxies.get(&entry.proxy_id) {
                        for channel in instance.channels.all() {
                            if channel.page().is_some() {
                                channel.clear_page();
                                cleared += 1;
                            }
                        }
                    }
                }
                Reply::ok(vec![cleared.to_string()])
            }
            _ => usage("unknown CURRENTPAGE sub-verb"),
        }
    }
}

fn collect_pages(hub: &crate::hub::HubCtx, proxy_filter: Option<&str>) -> Vec<PageRow> {
    let mut rows = Vec::new();
    for entry in hub.proxies.list(None, true) {
        if proxy_filter.map(|f| f != entry.proxy_id).unwrap_or(false) {
            continue;
        }
        let Ok(instance) = hub.proxies.get(&entry.proxy_id) else { continue };
        for channel in instance.channels.all() {
            if let Some(page) = channel.page() {
                rows.push(PageRow {
                    proxy_id: entry.proxy_id.clone(),
                    channel_id: channel.id.clone(),
                    page,
                });
            }
        }
    }
    rows.sort_by(|a, b| a.proxy_id.cmp(&b.proxy_id).then(a.channel_id.cmp(&b.channel_id)));
    rows
}
