// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tunnel supervisor: public URLs for local proxies.
//!
//! Spawns the provider binary as a managed process, scrapes its output
//! for the advertised URL, and wires the URL back onto the proxy so
//! injection rewrites match the public origin.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use agnt_core::ErrorKind;
use agnt_proc::{OutputStream, ProcessManager, SpawnSpec, StopProfile};
use agnt_proxy::ProxyManager;
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

/// How long we scrape provider output for the advertised URL.
const URL_SCRAPE_DEADLINE: Duration = Duration::from_secs(60);
const URL_SCRAPE_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("unknown tunnel provider: {0}")]
    UnknownProvider(String),

    #[error("no such tunnel: {0}")]
    NotFound(String),

    #[error("no such proxy: {0}")]
    ProxyNotFound(String),

    #[error("process error: {0}")]
    Proc(#[from] agnt_proc::ProcError),
}

impl TunnelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TunnelError::UnknownProvider(_) => ErrorKind::Usage,
            TunnelError::NotFound(_) | TunnelError::ProxyNotFound(_) => ErrorKind::NotFound,
            TunnelError::Proc(e) => e.kind(),
        }
    }
}

/// Supported provider binaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TunnelProvider {
    Cloudflared,
    Ngrok,
}

impl TunnelProvider {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cloudflared" => Some(TunnelProvider::Cloudflared),
            "ngrok" => Some(TunnelProvider::Ngrok),
            _ => None,
        }
    }

    pub fn binary(self) -> &'static str {
        match self {
            TunnelProvider::Cloudflared => "cloudflared",
            TunnelProvider::Ngrok => "ngrok",
        }
    }

    pub fn args(self, port: u16) -> Vec<String> {
        match self {
            TunnelProvider::Cloudflared => {
                vec!["tunnel".into(), "--url".into(), format!("http://localhost:{port}")]
            }
            TunnelProvider::Ngrok => {
                vec!["http".into(), port.to_string(), "--log".into(), "stdout".into()]
            }
        }
    }

    /// Provider-specific pattern for the advertised public URL.
    pub fn url_regex(self) -> Regex {
        let pattern = match self {
            TunnelProvider::Cloudflared => r"https://[a-z0-9-]+\.trycloudflare\.com",
            TunnelProvider::Ngrok => r"url=(https://[^\s]+)",
        };
        match Regex::new(pattern) {
            Ok(regex) => regex,
            Err(_) => unreachable!("static pattern"),
        }
    }

    /// Pull the public URL out of a chunk of provider output.
    pub fn extract_url(self, output: &str) -> Option<String> {
        let regex = self.url_regex();
        let captures = regex.captures(output)?;
        let url = captures.get(1).or_else(|| captures.get(0))?;
        Some(url.as_str().to_string())
    }
}

/// One running tunnel.
#[derive(Clone)]
pub struct TunnelInfo {
    pub tunnel_id: String,
    pub provider: TunnelProvider,
    pub proxy_id: String,
    pub process_id: String,
    pub public_url: Arc<RwLock<Option<String>>>,
}

/// Serializable status row.
#[derive(Debug, Serialize)]
pub struct TunnelEntry {
    pub tunnel_id: String,
    pub provider: TunnelProvider,
    pub proxy_id: String,
    pub process_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

/// Registry of tunnels, layered over the process manager.
pub struct TunnelSupervisor {
    procs: Arc<ProcessManager>,
    proxies: Arc<ProxyManager>,
    tunnels: Mutex<HashMap<String, TunnelInfo>>,
}

impl TunnelSupervisor {
    pub fn new(procs: Arc<ProcessManager>, proxies: Arc<ProxyManager>) -> Self {
        Self { procs, proxies, tunnels: Mutex::new(HashMap::new()) }
    }

    /// Start a tunnel for a proxy. The public URL arrives asynchronously;
    /// `TUNNEL STATUS` reports it once scraped.
    pub fn start(
        self: &Arc<Self>,
        provider: TunnelProvider,
        proxy_id: &str,
    ) -> Result<TunnelInfo, TunnelError> {
        let proxy = self
            .proxies
            .get(proxy_id)
            .map_err(|_| TunnelError::ProxyNotFound(proxy_id.to_string()))?;

        let tunnel_id = format!("tun-{}", nanoid::nanoid!(8));
        let process_id = format!("tunnel-{tunnel_id}");

        let mut spec = SpawnSpec::new(process_id.clone(), provider.binary());
        spec.args = provider.args(proxy.port());
        spec.project_path = proxy.settings.project_path.clone();
        spec.labels.insert("tunnel".to_string(), tunnel_id.clone());
        self.procs.start(spec)?;

        let info = TunnelInfo {
            tunnel_id: tunnel_id.clone(),
            provider,
            proxy_id: proxy_id.to_string(),
            process_id: process_id.clone(),
            public_url: Arc::new(RwLock::new(None)),
        };
        self.tunnels.lock().insert(tunnel_id.clone(), info.clone());

        let this = Arc::clone(self);
        let watch = info.clone();
        tokio::spawn(async move { this.scrape_url(watch).await });

        info!(tunnel = %tunnel_id, proxy = %proxy_id, provider = ?provider, "tunnel starting");
        Ok(info)
    }

    /// Poll the provider's output until the URL shows up.
    async fn scrape_url(&self, info: TunnelInfo) {
        let deadline = tokio::time::Instant::now() + URL_SCRAPE_DEADLINE;
        while tokio::time::Instant::now() < deadline {
            let read = match self.procs.read_output(&info.process_id, OutputStream::Stdout, 0, false)
            {
                Ok(read) => read,
                Err(_) => return,
            };
            let text = String::from_utf8_lossy(&read.data);
            if let Some(url) = info.provider.extract_url(&text) {
                info!(tunnel = %info.tunnel_id, url = %url, "tunnel url detected");
                *info.public_url.write() = Some(url.clone());
                if let Ok(proxy) = self.proxies.get(&info.proxy_id) {
                    proxy.set_public_url(Some(url));
                }
                return;
            }
            tokio::time::sleep(URL_SCRAPE_INTERVAL).await;
        }
        warn!(tunnel = %info.tunnel_id, "provider never advertised a url");
    }

    pub fn get(&self, tunnel_id: &str) -> Result<TunnelEntry, TunnelError> {
        self.tunnels
            .lock()
            .get(tunnel_id)
            .map(entry)
            .ok_or_else(|| TunnelError::NotFound(tunnel_id.to_string()))
    }

    pub fn list(&self) -> Vec<TunnelEntry> {
        let mut entries: Vec<TunnelEntry> = self.tunnels.lock().values().map(entry).collect();
        entries.sort_by(|a, b| a.tunnel_id.cmp(&b.tunnel_id));
        entries
    }

    /// Stop the provider process and clear the proxy's public URL.
    pub async fn stop(&self, tunnel_id: &str) -> Result<(), TunnelError> {
        let info = self
            .tunnels
            .lock()
            .remove(tunnel_id)
            .ok_or_else(|| TunnelError::NotFound(tunnel_id.to_string()))?;
        let _ = self.procs.stop(&info.process_id, StopProfile::Graceful).await;
        if let Ok(proxy) = self.proxies.get(&info.proxy_id) {
            proxy.set_public_url(None);
        }
        Ok(())
    }

    /// Stop every tunnel (daemon shutdown).
    pub async fn shutdown_all(&self) {
        let ids: Vec<String> = self.tunnels.lock().keys().cloned().collect();
        for id in ids {
            let _ = self.stop(&id).await;
        }
    }
}

fn entry(info: &TunnelInfo) -> TunnelEntry {
    TunnelEntry {
        tunnel_id: info.tunnel_id.clone(),
        provider: info.provider,
        proxy_id: info.proxy_id.clone(),
        process_id: info.process_id.clone(),
        public_url: info.public_url.read().clone(),
    }
}

#[cfg(test)]
#[path = "tunnel_tests.rs"]
mod tests;
