// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `PROXY` — reverse proxy operations.
//!
//! ```text
//! PROXY START <id> <target-url> [port=N] [cwd=path]
//! PROXY STOP <id>
//! PROXY STATUS <id>
//! PROXY LIST [cwd=path] [global=true]
//! PROXY EXEC <id> <source> [timeout_ms=N]
//! PROXY TOAST <id> <message> [level=info|warn|error]
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use agnt_proxy::{CreateParams, EXEC_TIMEOUT};
use agnt_wire::Reply;
use async_trait::async_trait;

use super::{json_field, split_args, usage, HandlerCtx, VerbHandler};

pub struct ProxyHandler;

#[async_trait]
impl VerbHandler for ProxyHandler {
    async fn handle(&self, ctx: HandlerCtx<'_>, sub: Option<&str>, args: &[String]) -> Reply {
        let (positional, options) = split_args(args);
        match sub {
            Some("START") => start(ctx, &positional, &options).await,
            Some("STOP") => stop(ctx, &positional).await,
            Some("STATUS") => status(ctx, &positional),
            Some("LIST") => list(ctx, &options).await,
            Some("EXEC") => exec(ctx, &positional, &options).await,
            Some("TOAST") => toast(ctx, &positional, &options),
            _ => usage("unknown PROXY sub-verb"),
        }
    }
}

async fn start(
    ctx: HandlerCtx<'_>,
    positional: &[&str],
    options: &HashMap<&str, &str>,
) -> Reply {
    let [id, target] = positional else {
        return usage("PROXY START <id> <target-url>");
    };
    let port = match options.get("port") {
        None => None,
        Some(raw) => match raw.parse::<u16>() {
            Ok(port) => Some(port),
            Err(_) => return usage(format!("bad port: {raw}")),
        },
    };
    let params = CreateParams {
        proxy_id: id.to_string(),
        target: target.to_string(),
        port,
        project_path: options.get("cwd").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
        chaos: None,
        overlay: None,
    };
    match ctx.hub.proxies.create(params).await {
        Ok(instance) => {
            ctx.hub.saver.request_save();
            Reply::ok(vec![
                instance.id().to_string(),
                instance.port().to_string(),
                instance.state().to_string(),
            ])
        }
        Err(e) => Reply::err(e.kind(), e.to_string()),
    }
}

async fn stop(ctx: HandlerCtx<'_>, positional: &[&str]) -> Reply {
    let [id] = positional else {
        return usage("PROXY STOP <id>");
    };
    match ctx.hub.proxies.destroy(id).await {
        Ok(()) => {
            ctx.hub.saver.request_save();
            Reply::ok(vec![id.to_string(), "stopped".to_string()])
        }
        Err(e) => Reply::err(e.kind(), e.to_string()),
    }
}

fn status(ctx: HandlerCtx<'_>, positional: &[&str]) -> Reply {
    let [id] = positional else {
        return usage("PROXY STATUS <id>");
    };
    let instance = match ctx.hub.proxies.get(id) {
        Ok(instance) => instance,
        Err(e) => return Reply::err(e.kind(), e.to_string()),
    };
    let detail = serde_json::json!({
        "proxy_id": instance.id(),
        "target": instance.settings.target.to_string(),
        "port": instance.port(),
        "state": instance.state(),
        "public_url": instance.public_url(),
        "browser_channels": instance.channels.len(),
        "chaos": instance.chaos_config(),
        "overlay": instance.overlay_config(),
        "project_path": instance.settings.project_path,
        "created_at_ms": instance.created_at_ms(),
    });
    Reply::ok(vec![json_field(&detail)])
}

async fn list(ctx: HandlerCtx<'_>, options: &HashMap<&str, &str>) -> Reply {
    let project_path = options.get("cwd").map(PathBuf::from);
    let global = options.get("global") == Some(&"true");
    let entries = ctx.hub.proxies.list(project_path.as_deref(), global);
    for entry in &entries {
        ctx.conn.stream_event("proxy", vec![json_field(entry)]).await;
    }
    Reply::ok(vec![entries.len().to_string()])
}

async fn exec(
    ctx: HandlerCtx<'_>,
    positional: &[&str],
    options: &HashMap<&str, &str>,
) -> Reply {
    let [id, source] = positional else {
        return usage("PROXY EXEC <id> <source>");
    };
    let timeout = match options.get("timeout_ms") {
        None => EXEC_TIMEOUT,
        Some(raw) => match raw.parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => return usage(format!("bad timeout_ms: {raw}")),
        },
    };
    let instance = match ctx.hub.proxies.get(id) {
        Ok(instance) => instance,
        Err(e) => return Reply::err(e.kind(), e.to_string()),
    };
    match instance.execute(source.to_string(), timeout).await {
        Ok(value) => Reply::ok(vec![json_field(&value)]),
        Err(e) => Reply::err(e.kind(), e.to_string()),
    }
}

fn toast(
    ctx: HandlerCtx<'_>,
    positional: &[&str],
    options: &HashMap<&str, &str>,
) -> Reply {
    let [id, message] = positional else {
        return usage("PROXY TOAST <id> <message>");
    };
    let level = options.get("level").copied().unwrap_or("info");
    let instance = match ctx.hub.proxies.get(id) {
        Ok(instance) => instance,
        Err(e) => return Reply::err(e.kind(), e.to_string()),
    };
    instance.toast(message.to_string(), level.to_string());
    Reply::ok(vec![instance.channels.len().to_string()])
}
