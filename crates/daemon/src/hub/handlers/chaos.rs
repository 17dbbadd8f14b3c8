// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `CHAOS` — fault injection control.
//!
//! ```text
//! CHAOS ENABLE <proxy-id>
//! CHAOS DISABLE <proxy-id>
//! CHAOS STATUS <proxy-id>
//! CHAOS SET <proxy-id> <key=value>...
//! CHAOS PRESET <proxy-id> <slow|flaky|offline>
//! ```

use agnt_core::{ChaosConfig, ChaosPreset};
use agnt_wire::Reply;
use async_trait::async_trait;

use super::{json_field, split_args, usage, HandlerCtx, VerbHandler};

pub struct ChaosHandler;

#[async_trait]
impl VerbHandler for ChaosHandler {
    async fn handle(&self, ctx: HandlerCtx<'_>, sub: Option<&str>, args: &[String]) -> Reply {
        let (positional, options) = split_args(args);
        let Some((&id, rest)) = positional.split_first() else {
            return usage("CHAOS <sub> <proxy-id>");
        };
        let instance = match ctx.hub.proxies.get(id) {
            Ok(instance) => instance,
            Err(e) => return Reply::err(e.kind(), e.to_string()),
        };

        let reply = match sub {
            Some("ENABLE") => {
                if instance.chaos_config().is_none() {
                    instance.set_chaos(Some(ChaosConfig::default()));
                }
                Reply::ok(vec![id.to_string(), "enabled".to_string()])
            }
            Some("DISABLE") => {
                instance.set_chaos(None);
                Reply::ok(vec![id.to_string(), "disabled".to_string()])
            }
            Some("STATUS") => {
                let status = serde_json::json!({
                    "proxy_id": id,
                    "enabled": instance.chaos_config().is_some(),
                    "config": instance.chaos_config(),
                });
                return Reply::ok(vec![json_field(&status)]);
            }
            Some("SET") => {
                if options.is_empty() {
                    return usage("CHAOS SET <proxy-id> <key=value>...");
                }
                let mut config = instance.chaos_config().unwrap_or_default();
                for (key, value) in &options {
                    if let Err(message) = config.set_option(key, value) {
                        return usage(message);
                    }
                }
                instance.set_chaos(Some(config));
                Reply::ok(vec![id.to_string(), "set".to_string()])
            }
            Some("PRESET") => {
                let [name] = rest else {
                    return usage("CHAOS PRESET <proxy-id> <slow|flaky|offline>");
                };
                let Some(preset) = ChaosPreset::parse(name) else {
                    return usage(format!("unknown preset: {name}"));
                };
                instance.set_chaos(Some(preset.config()));
                Reply::ok(vec![id.to_string(), preset.as_str().to_string()])
            }
            _ => return usage("unknown CHAOS sub-verb"),
        };
        ctx.hub.saver.request_save();
        reply
    }
}
