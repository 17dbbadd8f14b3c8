// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proxy registry: create, destroy, list, snapshot, rebuild.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use agnt_core::{ChaosConfig, OverlayConfig, ProxyState};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use url::Url;

use crate::instance::{ProxyError, ProxyEvent, ProxyInstance, ProxySettings};
use crate::ports::derive_port;

/// Persisted shape of one proxy, enough to rebuild it at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyRecord {
    pub proxy_id: String,
    pub target: String,
    pub port: u16,
    #[serde(default)]
    pub explicit_port: bool,
    pub project_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chaos: Option<ChaosConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<OverlayConfig>,
}

/// Summary row for `PROXY LIST`.
#[derive(Debug, Clone, Serialize)]
pub struct ProxyEntry {
    pub proxy_id: String,
    pub target: String,
    pub port: u16,
    pub state: ProxyState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    pub browser_channels: usize,
    pub project_path: PathBuf,
    pub created_at_ms: u64,
}

/// Parameters for `PROXY START`.
#[derive(Debug, Clone)]
pub struct CreateParams {
    pub proxy_id: String,
    pub target: String,
    pub port: Option<u16>,
    pub project_path: PathBuf,
    pub chaos: Option<ChaosConfig>,
    pub overlay: Option<OverlayConfig>,
}

/// Registry of proxy instances keyed by id.
pub struct ProxyManager {
    proxies: RwLock<HashMap<String, Arc<ProxyInstance>>>,
    event_tx: mpsc::UnboundedSender<ProxyEvent>,
}

impl ProxyManager {
    /// The returned receiver carries traffic events from every instance.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProxyEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (Self { proxies: RwLock::new(HashMap::new()), event_tx }, event_rx)
    }

    /// Create and start a proxy. Explicit ports win; auto-assigned ports
    /// derive from the target, so a second auto proxy for the same target
    /// collides.
    pub async fn create(&self, params: CreateParams) -> Result<Arc<ProxyInstance>, ProxyError> {
        let target: Url = params
            .target
            .parse()
            .map_err(|_| ProxyError::BadTarget(params.target.clone()))?;
        let port = params.port.unwrap_or_else(|| derive_port(&params.target));

        {
            let proxies = self.proxies.read();
            if proxies.contains_key(&params.proxy_id) {
                return Err(ProxyError::Exists(params.proxy_id));
            }
            if let Some(taken) = proxies.values().find(|p| p.port() == port) {
                warn!(
                    proxy = %params.proxy_id,
                    port,
                    holder = %taken.id(),
                    "port collision on create"
                );
                return Err(ProxyError::PortTaken(port));
            }
        }

        let instance = ProxyInstance::new(ProxySettings {
            proxy_id: params.proxy_id.clone(),
            target,
            port,
            explicit_port: params.port.is_some(),
            project_path: params.project_path,
            chaos: params.chaos,
            overlay: params.overlay,
            event_tx: Some(self.event_tx.clone()),
        })?;
        instance.start().await?;

        self.proxies.write().insert(params.proxy_id, Arc::clone(&instance));
        Ok(instance)
    }

    pub fn get(&self, id: &str) -> Result<Arc<ProxyInstance>, ProxyError> {
        self.proxies.read().get(id).cloned().ok_or_else(|| ProxyError::NotFound(id.to_string()))
    }

    /// Stop and remove a proxy. Unknown ids are `NOT_FOUND` (documented
    /// choice; the `OK not_present` alternative was rejected).
    pub async fn destroy(&self, id: &str) -> Result<(), ProxyError> {
        let instance = self.get(id)?;
        let result = instance.stop().await;
        self.proxies.write().remove(id);
        result
    }

    pub fn list(&self, project_path: Option<&std::path::Path>, global: bool) -> Vec<ProxyEntry> {
        let proxies = self.proxies.read();
        let mut entries: Vec<ProxyEntry> = proxies
            .values()
            .filter(|p| {
                global
                    || project_path
                        .map(|root| p.settings.project_path == root)
                        .unwrap_or(true)
            })
            .map(|p| ProxyEntry {
                proxy_id: p.id().to_string(),
                target: p.settings.target.to_string(),
                port: p.port(),
                state: p.state(),
                public_url: p.public_url(),
                browser_channels: p.channels.len(),
                project_path: p.settings.project_path.clone(),
                created_at_ms: p.created_at_ms(),
            })
            .collect();
        entries.sort_by(|a, b| a.proxy_id.cmp(&b.proxy_id));
        entries
    }

    /// Snapshot for the state file.
    pub fn records(&self) -> Vec<ProxyRecord> {
        let proxies = self.proxies.read();
        let mut records: Vec<ProxyRecord> = proxies
            .values()
            .map(|p| ProxyRecord {
                proxy_id: p.id().to_string(),
                target: p.settings.target.to_string(),
                port: p.port(),
                explicit_port: p.settings.explicit_port,
                project_path: p.settings.project_path.clone(),
                chaos: p.chaos_config(),
                overlay: p.overlay_config(),
            })
            .collect();
        records.sort_by(|a, b| a.proxy_id.cmp(&b.proxy_id));
        records
    }

    /// Recreate persisted proxies whose upstream still answers; stale
    /// entries are dropped. Returns (restored, dropped).
    pub async fn rebuild(&self, records: Vec<ProxyRecord>) -> (usize, usize) {
        let mut restored = 0;
        let mut dropped = 0;
        for record in records {
            if !probe_target(&record.target).await {
                info!(proxy = %record.proxy_id, target = %record.target, "dropping stale proxy");
                dropped += 1;
                continue;
            }
            let params = CreateParams {
                proxy_id: record.proxy_id.clone(),
                target: record.target,
                port: record.explicit_port.then_some(record.port),
                project_path: record.project_path,
                chaos: record.chaos,
                overlay: record.overlay,
            };
            match self.create(params).await {
                Ok(_) => restored += 1,
                Err(e) => {
                    warn!(proxy = %record.proxy_id, error = %e, "failed to rebuild proxy");
                    dropped += 1;
                }
            }
        }
        (restored, dropped)
    }

    /// Stop every proxy (daemon shutdown).
    pub async fn shutdown_all(&self) {
        let instances: Vec<Arc<ProxyInstance>> =
            self.proxies.write().drain().map(|(_, v)| v).collect();
        for instance in instances {
            let _ = instance.stop().await;
        }
    }
}

/// Liveness probe used by rebuild.
async fn probe_target(target: &str) -> bool {
    let Ok(url) = target.parse::<Url>() else {
        return false;
    };
    let Some(host) = url.host_str().map(str::to_string) else {
        return false;
    };
    let port = url.port_or_known_default().unwrap_or(80);
    tokio::time::timeout(Duration::from_millis(500), tokio::net::TcpStream::connect((host, port)))
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
