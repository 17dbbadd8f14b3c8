// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `DETECT [path]` — project-type heuristics.

use std::path::PathBuf;

use agnt_wire::Reply;
use async_trait::async_trait;

use super::{split_args, HandlerCtx, VerbHandler};
use crate::detect::detect_project;

pub struct DetectHandler;

#[async_trait]
impl VerbHandler for DetectHandler {
    async fn handle(&self, _ctx: HandlerCtx<'_>, _sub: Option<&str>, args: &[String]) -> Reply {
        let (positional, _options) = split_args(args);
        let path = positional
            .first()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Reply::ok(vec![detect_project(&path).to_string()])
    }
}
