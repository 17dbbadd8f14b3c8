// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `SCHEDULE` — deferred messages to sessions.
//!
//! ```text
//! SCHEDULE ADD <session-code> <at> <message>   # at = epoch ms, or +ms offset
//! SCHEDULE CANCEL <task-id>
//! SCHEDULE LIST [session=code]
//! SCHEDULE STATUS <task-id>
//! ```

use agnt_core::{Clock, ErrorKind, SystemClock};
use agnt_wire::Reply;
use async_trait::async_trait;

use super::{json_field, split_args, usage, HandlerCtx, VerbHandler};
use crate::scheduler::SchedulerError;

pub struct ScheduleHandler;

#[async_trait]
impl VerbHandler for ScheduleHandler {
    async fn handle(&self, ctx: HandlerCtx<'_>, sub: Option<&str>, args: &[String]) -> Reply {
        let (positional, options) = split_args(args);
        match sub {
            Some("ADD") => {
                let [code, at, message] = positional[..] else {
                    return usage("SCHEDULE ADD <session-code> <at> <message>");
                };
                let deliver_at_ms = match parse_at(at) {
                    Some(at) => at,
                    None => return usage(format!("bad deliver-at: {at}")),
                };
                let task = ctx.hub.scheduler.add(code, message, deliver_at_ms);
                Reply::ok(vec![task.id.as_str().to_string(), task.deliver_at_ms.to_string()])
            }
            Some("CANCEL") => {
                let [task_id] = positional[..] else {
                    return usage("SCHEDULE CANCEL <task-id>");
                };
                match ctx.hub.scheduler.cancel(task_id) {
                    Ok(()) => Reply::ok(vec![task_id.to_string(), "cancelled".to_string()]),
                    Err(e @ SchedulerError::NotFound(_)) => {
                        Reply::err(ErrorKind::NotFound, e.to_string())
                    }
                    Err(e) => Reply::err(ErrorKind::InvalidState, e.to_string()),
                }
            }
            Some("LIST") => {
                let tasks = ctx.hub.scheduler.list(options.get("session").copied());
                for task in &tasks {
                    ctx.conn.stream_event("schedule", vec![json_field(task)]).await;
                }
                Reply::ok(vec![tasks.len().to_string()])
            }
            Some("STATUS") => {
                let [task_id] = positional[..] else {
                    return usage("SCHEDULE STATUS <task-id>");
                };
                match ctx.hub.scheduler.get(task_id) {
                    Some(task) => Reply::ok(vec![json_field(&task)]),
                    None => Reply::err(ErrorKind::NotFound, format!("no such task: {task_id}")),
                }
            }
            _ => usage("unknown SCHEDULE sub-verb"),
        }
    }
}

/// `+5000` = five seconds from now, otherwise absolute epoch ms.
fn parse_at(raw: &str) -> Option<u64> {
    if let Some(offset) = raw.strip_prefix('+') {
        let offset: u64 = offset.parse().ok()?;
        return Some(SystemClock.epoch_ms() + offset);
    }
    raw.parse().ok()
}
