// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `PROC` — managed process operations.
//!
//! ```text
//! PROC START <id> <cmd> [arg...] [cwd=path] [env.K=V] [label.K=V] [pty=true] [restart=never|on-failure|always]
//! PROC STOP <id> [immediate=true]
//! PROC STATUS <id>
//! PROC LIST [cwd=path] [global=true]
//! PROC OUTPUT <id> [stream=stdout|stderr] [offset=N] [ack=true]
//! PROC SIGNAL <id> <NAME>
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use agnt_core::{ErrorKind, RestartPolicy};
use agnt_proc::{ListFilter, OutputStream, SpawnSpec, StopProfile};
use agnt_wire::{encode_bytes, Reply};
use async_trait::async_trait;

use super::{json_field, split_args, usage, HandlerCtx, VerbHandler};

pub struct ProcHandler;

#[async_trait]
impl VerbHandler for ProcHandler {
    async fn handle(&self, ctx: HandlerCtx<'_>, sub: Option<&str>, args: &[String]) -> Reply {
        let (positional, options) = split_args(args);
        match sub {
            Some("START") => start(ctx, &positional, &options),
            Some("STOP") => stop(ctx, &positional, &options).await,
            Some("STATUS") => status(ctx, &positional),
            Some("LIST") => list(ctx, &options).await,
            Some("OUTPUT") => output(ctx, &positional, &options),
            Some("SIGNAL") => signal(ctx, &positional),
            _ => usage("unknown PROC sub-verb"),
        }
    }
}

fn start(
    ctx: HandlerCtx<'_>,
    positional: &[&str],
    options: &HashMap<&str, &str>,
) -> Reply {
    let [id, command, rest @ ..] = positional else {
        return usage("PROC START <id> <cmd> [args...]");
    };

    let mut spec = SpawnSpec::new(*id, *command);
    spec.args = rest.iter().map(|s| s.to_string()).collect();
    if let Some(cwd) = options.get("cwd") {
        spec.project_path = PathBuf::from(cwd);
    }
    spec.pty = options.get("pty") == Some(&"true");
    if let Some(restart) = options.get("restart") {
        match RestartPolicy::parse(restart) {
            Some(policy) => spec.restart = policy,
            None => return usage(format!("bad restart policy: {restart}")),
        }
    }
    for (key, value) in options {
        if let Some(name) = key.strip_prefix("env.") {
            spec.env.insert(name.to_string(), value.to_string());
        } else if let Some(name) = key.strip_prefix("label.") {
            spec.labels.insert(name.to_string(), value.to_string());
        }
    }

    match ctx.hub.procs.start(spec) {
        Ok(process) => Reply::ok(vec![
            process.id().to_string(),
            process.state().to_string(),
        ]),
        Err(e) => Reply::err(e.kind(), e.to_string()),
    }
}

async fn stop(
    ctx: HandlerCtx<'_>,
    positional: &[&str],
    options: &HashMap<&str, &str>,
) -> Reply {
    let [id] = positional else {
        return usage("PROC STOP <id>");
    };
    let profile = if options.get("immediate") == Some(&"true") {
        StopProfile::Immediate
    } else {
        StopProfile::Graceful
    };
    match ctx.hub.procs.stop(id, profile).await {
        Ok(()) => Reply::ok(vec![id.to_string(), "stopped".to_string()]),
        Err(e) => Reply::err(e.kind(), e.to_string()),
    }
}

fn status(ctx: HandlerCtx<'_>, positional: &[&str]) -> Reply {
    let [id] = positional else {
        return usage("PROC STATUS <id>");
    };
    let process = match ctx.hub.procs.get(id) {
        Ok(process) => process,
        Err(e) => return Reply::err(e.kind(), e.to_string()),
    };
    let detail = serde_json::json!({
        "process_id": process.id(),
        "state": process.state(),
        "pid": process.pid(),
        "command": process.spec.command,
        "args": process.spec.args,
        "project_path": process.spec.project_path,
        "started_at_ms": process.started_at_ms(),
        "labels": process.labels(),
        "exit_code": process.last_exit().and_then(|e| e.code),
        "restart": process.spec.restart,
    });
    Reply::ok(vec![json_field(&detail)])
}

async fn list(ctx: HandlerCtx<'_>, options: &HashMap<&str, &str>) -> Reply {
    let filter = ListFilter {
        project_path: options.get("cwd").map(PathBuf::from),
        global: options.get("global") == Some(&"true"),
    };
    let entries = ctx.hub.procs.list(&filter);
    for entry in &entries {
        ctx.conn.stream_event("proc", vec![json_field(entry)]).await;
    }
    Reply::ok(vec![entries.len().to_string()])
}

fn output(
    ctx: HandlerCtx<'_>,
    positional: &[&str],
    options: &HashMap<&str, &str>,
) -> Reply {
    let [id] = positional else {
        return usage("PROC OUTPUT <id>");
    };
    let stream = match options.get("stream") {
        None => OutputStream::Stdout,
        Some(name) => match OutputStream::parse(name) {
            Some(stream) => stream,
            None => return usage(format!("bad stream: {name}")),
        },
    };
    let offset: u64 = match options.get("offset") {
        None => 0,
        Some(raw) => match raw.parse() {
            Ok(offset) => offset,
            Err(_) => return usage(format!("bad offset: {raw}")),
        },
    };
    let ack = options.get("ack") == Some(&"true");

    match ctx.hub.procs.read_output(id, stream, offset, ack) {
        Ok(read) => {
            // The length field is authoritative; `-` stands in for an
            // empty payload (fields cannot be empty on the wire).
            let data = if read.data.is_empty() { "-".to_string() } else { encode_bytes(&read.data) };
            Reply::ok(vec![
                read.offset.to_string(),
                read.data.len().to_string(),
                read.truncated.to_string(),
                data,
            ])
        }
        Err(e) => Reply::err(e.kind(), e.to_string()),
    }
}

fn signal(ctx: HandlerCtx<'_>, positional: &[&str]) -> Reply {
    let [id, name] = positional else {
        return usage("PROC SIGNAL <id> <NAME>");
    };
    let Some(signum) = agnt_proc::platform::parse_signal(name) else {
        return Reply::err(ErrorKind::Usage, format!("unknown signal: {name}"));
    };
    match ctx.hub.procs.signal(id, signum) {
        Ok(()) => Reply::ok(vec![id.to_string(), name.to_string()]),
        Err(e) => Reply::err(e.kind(), e.to_string()),
    }
}
