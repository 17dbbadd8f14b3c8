// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Verb handlers.
//!
//! Each module owns one verb. Handlers return a terminal [`Reply`];
//! list-shaped results stream `EVENT` lines through the connection first.

mod chaos;
mod currentpage;
mod detect;
mod overlay;
mod proc;
mod proxy;
mod proxylog;
mod schedule;
mod session;
mod subscribe;
mod tunnel;
mod upgrade;

use std::collections::HashMap;

use agnt_core::ErrorKind;
use agnt_wire::{Registry, Reply, VERBS};
use async_trait::async_trait;

use crate::hub::subscribers::ConnectionShared;
use crate::hub::HubCtx;

/// Per-request handler context.
pub struct HandlerCtx<'a> {
    pub hub: &'a std::sync::Arc<HubCtx>,
    pub conn: &'a ConnectionShared,
}

#[async_trait]
pub trait VerbHandler: Send + Sync {
    async fn handle(&self, ctx: HandlerCtx<'_>, sub: Option<&str>, args: &[String]) -> Reply;
}

pub type HandlerBox = Box<dyn VerbHandler>;

/// Register every agnt verb. `HELLO` and `PING` are handled inline by the
/// connection loop but still registered so the table matches the wire
/// surface.
pub fn build_registry() -> Registry<HandlerBox> {
    let mut registry: Registry<HandlerBox> = Registry::new();
    for (verb, subverbs) in VERBS {
        let handler: HandlerBox = match *verb {
            "HELLO" | "PING" => Box::new(NoopHandler),
            "PROC" => Box::new(proc::ProcHandler),
            "PROXY" => Box::new(proxy::ProxyHandler),
            "PROXYLOG" => Box::new(proxylog::ProxyLogHandler),
            "TUNNEL" => Box::new(tunnel::TunnelHandler),
            "CHAOS" => Box::new(chaos::ChaosHandler),
            "CURRENTPAGE" => Box::new(currentpage::CurrentPageHandler),
            "OVERLAY" => Box::new(overlay::OverlayHandler),
            "SCHEDULE" => Box::new(schedule::ScheduleHandler),
            "SESSION" => Box::new(session::SessionHandler),
            "SUBSCRIBE" => Box::new(subscribe::SubscribeHandler { unsubscribe: false }),
            "UNSUBSCRIBE" => Box::new(subscribe::SubscribeHandler { unsubscribe: true }),
            "DETECT" => Box::new(detect::DetectHandler),
            "UPGRADE" => Box::new(upgrade::UpgradeHandler),
            other => unreachable!("unwired verb {other}"),
        };
        if registry.register(verb, subverbs, handler).is_err() {
            unreachable!("verb table has duplicates");
        }
    }
    registry
}

struct NoopHandler;

#[async_trait]
impl VerbHandler for NoopHandler {
    async fn handle(&self, _ctx: HandlerCtx<'_>, _sub: Option<&str>, _args: &[String]) -> Reply {
        Reply::ok(Vec::new())
    }
}

/// Split args into positional fields and trailing `key=value` options.
///
/// An option key is lowercase (dots allowed, e.g. `env.PATH`); anything
/// else stays positional.
pub(crate) fn split_args(args: &[String]) -> (Vec<&str>, HashMap<&str, &str>) {
    let mut positional = Vec::new();
    let mut options = HashMap::new();
    for arg in args {
        match arg.split_once('=') {
            Some((key, value)) if is_option_key(key) => {
                options.insert(key, value);
            }
            _ => positional.push(arg.as_str()),
        }
    }
    (positional, options)
}

fn is_option_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'.')
        || key.starts_with("env.")
        || key.starts_with("label.")
}

pub(crate) fn usage(message: impl Into<String>) -> Reply {
    Reply::err(ErrorKind::Usage, message)
}

/// Serialize a payload into a single wire field.
pub(crate) fn json_field<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
