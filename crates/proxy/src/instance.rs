// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One reverse proxy instance.
//!
//! An axum listener on the assigned port forwards everything except the
//! reserved paths to the upstream target via reqwest. HTML responses pass
//! through the injector without buffering more than the scan prefix;
//! small text responses are buffered so the traffic log can keep a body
//! sample.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use agnt_core::{
    truncate_body, ChaosConfig, Clock, ErrorKind, HttpPayload, OverlayConfig, ProxyState,
    RestartWindow, StateCell, SystemClock, TrafficEntry, TrafficKind,
};
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Request, Response, StatusCode};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::channel::{ChannelSet, OutboundFrame};
use crate::chaos::{self, ChaosOutcome};
use crate::inject::{is_injectable_content_type, HtmlInjector, INJECT_SCAN_CAP};
use crate::traffic_log::TrafficLog;
use crate::ws;
use crate::{METRICS_PATH, SCRIPT_PATH};

/// Upstream dial loop: once per second, at most five per minute.
const DIAL_INTERVAL: Duration = Duration::from_secs(1);

/// Default deadline for `PROXY EXEC` round-trips.
pub const EXEC_TIMEOUT: Duration = Duration::from_secs(10);

/// Bodies at or under this size are buffered whole (log sample + exact
/// Content-Length); larger ones stream.
const BUFFER_CAP: usize = 64 * 1024;

/// The instrumentation bundle served at [`SCRIPT_PATH`].
const CLIENT_BUNDLE: &str = include_str!("client_bundle.js");

/// Event pushed toward hub subscribers.
#[derive(Debug, Clone)]
pub enum ProxyEvent {
    /// One traffic log entry landed.
    Traffic { proxy_id: String, entry: TrafficEntry },
    /// The instance gave up (listener error or dial budget spent).
    Failed { proxy_id: String },
}

/// Proxy-level errors, each mapping onto a wire kind.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("proxy already exists: {0}")]
    Exists(String),

    #[error("no such proxy: {0}")]
    NotFound(String),

    #[error("port {0} is taken")]
    PortTaken(u16),

    #[error("failed to bind port {port}: {source}")]
    Bind { port: u16, source: std::io::Error },

    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("no browser channel connected")]
    NoBrowser,

    #[error("execution timed out")]
    ExecTimeout,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid target url: {0}")]
    BadTarget(String),
}

impl ProxyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProxyError::Exists(_) | ProxyError::PortTaken(_) => ErrorKind::AlreadyExists,
            ProxyError::NotFound(_) => ErrorKind::NotFound,
            ProxyError::Bind { .. } => ErrorKind::Internal,
            ProxyError::UpstreamUnreachable(_) => ErrorKind::UpstreamUnreachable,
            ProxyError::NoBrowser => ErrorKind::InvalidState,
            ProxyError::ExecTimeout => ErrorKind::Timeout,
            ProxyError::InvalidState(_) => ErrorKind::InvalidState,
            ProxyError::BadTarget(_) => ErrorKind::Usage,
        }
    }
}

/// Construction parameters.
#[derive(Debug, Clone)]
pub struct ProxySettings {
    pub proxy_id: String,
    pub target: Url,
    pub port: u16,
    pub explicit_port: bool,
    pub project_path: PathBuf,
    pub chaos: Option<ChaosConfig>,
    pub overlay: Option<OverlayConfig>,
    /// Sink for traffic events fanned out to hub subscribers.
    pub event_tx: Option<tokio::sync::mpsc::UnboundedSender<ProxyEvent>>,
}

pub struct ProxyInstance {
    pub settings: ProxySettings,
    state: StateCell<ProxyState>,
    public_url: RwLock<Option<String>>,
    chaos: RwLock<Option<ChaosConfig>>,
    overlay: RwLock<Option<OverlayConfig>>,
    pub traffic: TrafficLog,
    pub channels: ChannelSet,
    pending_execs: Mutex<HashMap<String, oneshot::Sender<Value>>>,
    client: reqwest::Client,
    cancel: CancellationToken,
    created_at_ms: u64,
}

impl ProxyInstance {
    pub fn new(settings: ProxySettings) -> Result<Arc<Self>, ProxyError> {
        if !matches!(settings.target.scheme(), "http" | "https") {
            return Err(ProxyError::BadTarget(settings.target.to_string()));
        }
        let client = reqwest::Client::builder()
            .http1_only()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ProxyError::BadTarget(e.to_string()))?;
        let chaos = RwLock::new(settings.chaos.clone());
        let overlay = RwLock::new(settings.overlay.clone());
        Ok(Arc::new(Self {
            settings,
            state: StateCell::new(ProxyState::Starting),
            public_url: RwLock::new(None),
            chaos,
            overlay,
            traffic: TrafficLog::with_default_capacity(),
            channels: ChannelSet::new(),
            pending_execs: Mutex::new(HashMap::new()),
            client,
            cancel: CancellationToken::new(),
            created_at_ms: SystemClock.epoch_ms(),
        }))
    }

    pub fn id(&self) -> &str {
        &self.settings.proxy_id
    }

    pub fn port(&self) -> u16 {
        self.settings.port
    }

    pub fn state(&self) -> ProxyState {
        self.state.get()
    }

    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    pub fn public_url(&self) -> Option<String> {
        self.public_url.read().clone()
    }

    pub fn set_public_url(&self, url: Option<String>) {
        *self.public_url.write() = url;
    }

    pub fn chaos_config(&self) -> Option<ChaosConfig> {
        self.chaos.read().clone()
    }

    pub fn set_chaos(&self, config: Option<ChaosConfig>) {
        *self.chaos.write() = config;
    }

    pub fn overlay_config(&self) -> Option<OverlayConfig> {
        self.overlay.read().clone()
    }

    pub fn set_overlay(&self, config: Option<OverlayConfig>) {
        *self.overlay.write() = config;
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Bind the listener and start serving. The instance stays `Starting`
    /// until the upstream answers a dial; the dial loop promotes it.
    pub async fn start(self: &Arc<Self>) -> Result<(), ProxyError> {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", self.settings.port))
            .await
            .map_err(|e| {
                let _ = self.state.transition_from_current(ProxyState::Failed);
                if e.kind() == std::io::ErrorKind::AddrInUse {
                    ProxyError::PortTaken(self.settings.port)
                } else {
                    ProxyError::Bind { port: self.settings.port, source: e }
                }
            })?;

        let app = Router::new()
            .route(METRICS_PATH, get(ws::metrics_ws))
            .route(SCRIPT_PATH, get(serve_bundle))
            .fallback(forward)
            .with_state(Arc::clone(self));

        let cancel = self.cancel.clone();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { cancel.cancelled().await })
                .await;
            if let Err(e) = result {
                warn!(proxy = %this.id(), error = %e, "proxy listener error");
                let _ = this.state.transition_from_current(ProxyState::Failed);
                this.emit_failed();
            }
        });

        let this = Arc::clone(self);
        tokio::spawn(async move { this.dial_loop().await });

        info!(proxy = %self.id(), port = self.settings.port, target = %self.settings.target, "proxy listening");
        Ok(())
    }

    /// Re-dial the upstream until it answers; too many misses fail the
    /// proxy.
    async fn dial_loop(self: Arc<Self>) {
        let window = RestartWindow::default();
        loop {
            if self.state.get() != ProxyState::Starting {
                return;
            }
            if self.probe_upstream().await {
                if self.state.transition(ProxyState::Starting, ProxyState::Running).is_ok() {
                    info!(proxy = %self.id(), "upstream reachable, proxy running");
                }
                return;
            }
            if !window.record(Instant::now()) {
                warn!(proxy = %self.id(), target = %self.settings.target, "upstream never answered, failing proxy");
                let _ = self.state.transition(ProxyState::Starting, ProxyState::Failed);
                self.emit_failed();
                self.cancel.cancel();
                return;
            }
            tokio::select! {
                _ = tokio::time::sleep(DIAL_INTERVAL) => {}
                () = self.cancel.cancelled() => return,
            }
        }
    }

    async fn probe_upstream(&self) -> bool {
        let host = match self.settings.target.host_str() {
            Some(h) => h.to_string(),
            None => return false,
        };
        let port = self.settings.target.port_or_known_default().unwrap_or(80);
        tokio::time::timeout(
            Duration::from_millis(750),
            tokio::net::TcpStream::connect((host, port)),
        )
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false)
    }

    /// Stop listening, close browser channels, and settle in `Stopped`.
    ///
    /// Idempotent on terminal states.
    pub async fn stop(&self) -> Result<(), ProxyError> {
        if self.state.get().is_terminal() {
            self.cancel.cancel();
            self.channels.close_all();
            return Ok(());
        }
        self.state
            .transition_from_current(ProxyState::Stopping)
            .map_err(|_| ProxyError::InvalidState(format!("proxy is {}", self.state.get())))?;
        self.cancel.cancel();
        self.channels.close_all();
        self.pending_execs.lock().clear();
        let _ = self.state.transition(ProxyState::Stopping, ProxyState::Stopped);
        info!(proxy = %self.id(), "proxy stopped");
        Ok(())
    }

    /// Run JavaScript in the most recently seen browser and await the
    /// correlated response.
    pub async fn execute(&self, source: String, timeout: Duration) -> Result<Value, ProxyError> {
        let channel = self.channels.most_recent().ok_or(ProxyError::NoBrowser)?;
        let correlation_id = uuid::Uuid::new_v4().to_string();

        let (tx, rx) = oneshot::channel();
        self.pending_execs.lock().insert(correlation_id.clone(), tx);

        self.log_entry(TrafficEntry::browser(
            SystemClock.epoch_ms(),
            TrafficKind::Execution,
            Some(correlation_id.clone()),
            json!({ "source": source }),
        ));

        let frame = OutboundFrame::execute(correlation_id.clone(), source);
        if channel.push_critical(frame).await.is_err() {
            self.pending_execs.lock().remove(&correlation_id);
            return Err(ProxyError::NoBrowser);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => {
                self.pending_execs.lock().remove(&correlation_id);
                Err(ProxyError::NoBrowser)
            }
            Err(_) => {
                self.pending_execs.lock().remove(&correlation_id);
                Err(ProxyError::ExecTimeout)
            }
        }
    }

    /// Resolve a pending execution; unmatched responses are dropped.
    pub(crate) fn resolve_exec(&self, correlation_id: &str, value: Value) -> bool {
        match self.pending_execs.lock().remove(correlation_id) {
            Some(tx) => tx.send(value).is_ok(),
            None => {
                debug!(proxy = %self.id(), correlation_id, "dropping unmatched exec response");
                false
            }
        }
    }

    /// Show a toast in every connected browser.
    pub fn toast(&self, message: String, level: String) {
        self.channels.broadcast(&OutboundFrame::toast(message, level));
    }

    /// Append to the traffic log and fan out to hub subscribers.
    pub(crate) fn log_entry(&self, entry: TrafficEntry) {
        let stored = self.traffic.append(entry);
        if let Some(ref tx) = self.settings.event_tx {
            let _ = tx.send(ProxyEvent::Traffic {
                proxy_id: self.id().to_string(),
                entry: stored,
            });
        }
    }

    fn emit_failed(&self) {
        if let Some(ref tx) = self.settings.event_tx {
            let _ = tx.send(ProxyEvent::Failed { proxy_id: self.id().to_string() });
        }
    }
}

/// Serve the instrumentation bundle with immutable caching.
async fn serve_bundle(State(instance): State<Arc<ProxyInstance>>) -> Response<Body> {
    let body = CLIENT_BUNDLE.replace("__PROXY_ID__", instance.id());
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/javascript; charset=utf-8")
        .header(header::CACHE_CONTROL, "public, max-age=31536000, immutable")
        .body(Body::from(body))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

/// Hop-by-hop headers stripped in both directions.
fn is_hop_by_hop(name: &header::HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

fn wants_websocket(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
}

/// The catch-all: chaos, then upstream forward (HTTP or WebSocket).
async fn forward(
    State(instance): State<Arc<ProxyInstance>>,
    req: Request<Body>,
) -> Response<Body> {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let path_query =
        req.uri().path_and_query().map(|pq| pq.as_str().to_string()).unwrap_or_else(|| path.clone());

    if let Some(config) = instance.chaos_config() {
        match chaos::apply(&config, &path).await {
            ChaosOutcome::Continue => {}
            ChaosOutcome::Drop => {
                debug!(proxy = %instance.id(), %path, "chaos dropped request");
                return status_response(StatusCode::BAD_GATEWAY, "connection dropped");
            }
            ChaosOutcome::Status(code) => {
                let status =
                    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                return status_response(status, "status override");
            }
        }
    }

    if wants_websocket(req.headers()) {
        return ws::passthrough(instance, req).await;
    }

    let upstream_url = {
        let mut url = instance.settings.target.clone();
        url.set_path(&path);
        url.set_query(req.uri().query());
        url
    };

    let original_host = req
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut headers = HeaderMap::new();
    for (name, value) in req.headers() {
        if is_hop_by_hop(name) || *name == header::HOST || *name == header::CONTENT_LENGTH {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    if let Some(host) = original_host {
        if let Ok(value) = HeaderValue::from_str(&host) {
            headers.insert("x-forwarded-host", value);
        }
    }
    headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));
    headers.insert("x-forwarded-for", HeaderValue::from_static("127.0.0.1"));

    let body_stream = req.into_body().into_data_stream();
    let upstream_result = instance
        .client
        .request(method.clone(), upstream_url)
        .headers(headers)
        .body(reqwest::Body::wrap_stream(body_stream))
        .send()
        .await;

    let upstream = match upstream_result {
        Ok(resp) => resp,
        Err(e) => {
            warn!(proxy = %instance.id(), error = %e, "upstream unreachable");
            instance.log_entry(TrafficEntry::browser(
                SystemClock.epoch_ms(),
                TrafficKind::Error,
                None,
                json!({ "url": path_query, "message": format!("upstream unreachable: {e}") }),
            ));
            return status_response(StatusCode::BAD_GATEWAY, "upstream unreachable");
        }
    };

    respond(&instance, upstream, method.as_str(), &path_query, started).await
}

/// Build the downstream response: injection, overlay, traffic logging.
async fn respond(
    instance: &Arc<ProxyInstance>,
    upstream: reqwest::Response,
    method: &str,
    path_query: &str,
    started: Instant,
) -> Response<Body> {
    let status = upstream.status();
    let headers = upstream.headers().clone();

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let content_length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    let is_compressed = headers.contains_key(header::CONTENT_ENCODING);
    let is_redirect = status.is_redirection();

    let mut injectable =
        is_injectable_content_type(content_type.as_deref()) && !is_redirect;
    if injectable && is_compressed {
        // Resolved behavior for compressed upstreams: leave the body
        // alone and say so.
        warn!(proxy = %instance.id(), "declining HTML injection on compressed response");
        injectable = false;
    }

    let is_textual = content_type
        .as_deref()
        .map(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.starts_with("text/") || ct.starts_with("application/json")
        })
        .unwrap_or(false);

    let injector = injectable.then(|| {
        HtmlInjector::new(instance.id(), SCRIPT_PATH, instance.public_url().as_deref())
    });
    let overlay = instance.overlay_config().filter(|_| is_textual && !is_compressed && !is_redirect);

    let mut builder = Response::builder().status(status);
    for (name, value) in &headers {
        if is_hop_by_hop(name) || *name == header::CONTENT_LENGTH {
            continue;
        }
        builder = builder.header(name, value);
    }

    let duration_ms = started.elapsed().as_millis() as u64;
    let log_headers: Vec<(String, String)> = [header::CONTENT_TYPE, header::CONTENT_ENCODING]
        .iter()
        .filter_map(|name| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| (name.to_string(), v.to_string()))
        })
        .collect();

    // Small bodies: buffer whole, transform, log a sample, exact length.
    if content_length.map(|len| len <= BUFFER_CAP).unwrap_or(false) {
        let bytes = match upstream.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!(proxy = %instance.id(), error = %e, "upstream body read failed");
                return status_response(StatusCode::BAD_GATEWAY, "upstream body failed");
            }
        };

        // The overlay cap judges the upstream body, not our additions.
        let overlay = overlay.filter(|o| o.applies_to(bytes.len()));
        let mut body = match &injector {
            Some(injector) => injector.inject(&bytes),
            None => bytes,
        };
        if let Some(overlay) = overlay {
            let mut with_banner = Vec::with_capacity(overlay.banner.len() + body.len());
            with_banner.extend_from_slice(overlay.banner.as_bytes());
            with_banner.extend_from_slice(&body);
            body = Bytes::from(with_banner);
        }

        let log_body = is_textual.then(|| {
            let text = String::from_utf8_lossy(&body);
            truncate_body(&text)
        });
        instance.log_entry(http_entry(
            method,
            path_query,
            status.as_u16(),
            log_headers,
            log_body,
            duration_ms,
        ));

        builder = builder.header(header::CONTENT_LENGTH, body.len());
        return builder
            .body(Body::from(body))
            .unwrap_or_else(|_| status_response(StatusCode::INTERNAL_SERVER_ERROR, "response build"));
    }

    // Large/unknown-length bodies: log without a sample, stream through.
    instance.log_entry(http_entry(method, path_query, status.as_u16(), log_headers, None, duration_ms));

    let mut stream: BoxStream<'static, Result<Bytes, std::io::Error>> = upstream
        .bytes_stream()
        .map(|r| r.map_err(std::io::Error::other))
        .boxed();
    let mut added_len = 0usize;

    if let Some(injector) = injector {
        added_len += injector.added_len();
        stream = inject_stream(stream, injector);
    }

    if let Some(overlay) = overlay {
        match content_length {
            Some(len) if overlay.applies_to(len) => {
                added_len += overlay.banner.len();
                let banner = Bytes::from(overlay.banner.into_bytes());
                stream = futures_util::stream::once(async move { Ok(banner) })
                    .chain(stream)
                    .boxed();
            }
            Some(_) => {}
            // No declared length (chunked): prefix-buffer up to the cap
            // to learn whether the overlay still applies.
            None => stream = overlay_stream(stream, overlay),
        }
    }

    if let Some(len) = content_length {
        builder = builder.header(header::CONTENT_LENGTH, len + added_len);
    }

    builder
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| status_response(StatusCode::INTERNAL_SERVER_ERROR, "response build"))
}

enum PrefixPhase {
    Buffering(Vec<u8>),
    Streaming,
    Done,
}

type BodyStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// Stream an HTML body through the injector, holding only the prefix
/// needed to find the injection point.
fn inject_stream(upstream: BodyStream, injector: HtmlInjector) -> BodyStream {
    futures_util::stream::unfold(
        (upstream, PrefixPhase::Buffering(Vec::new()), injector),
        |(mut upstream, phase, injector)| async move {
            match phase {
                PrefixPhase::Buffering(mut buf) => loop {
                    match upstream.next().await {
                        Some(Ok(chunk)) => {
                            buf.extend_from_slice(&chunk);
                            if injection_point_known(&buf) || buf.len() >= INJECT_SCAN_CAP {
                                let out = injector.inject(&buf);
                                return Some((
                                    Ok(out),
                                    (upstream, PrefixPhase::Streaming, injector),
                                ));
                            }
                        }
                        Some(Err(e)) => {
                            return Some((Err(e), (upstream, PrefixPhase::Done, injector)))
                        }
                        None => {
                            let out = injector.inject(&buf);
                            return Some((Ok(out), (upstream, PrefixPhase::Done, injector)));
                        }
                    }
                },
                PrefixPhase::Streaming => match upstream.next().await {
                    Some(item) => Some((item, (upstream, PrefixPhase::Streaming, injector))),
                    None => None,
                },
                PrefixPhase::Done => None,
            }
        },
    )
    .boxed()
}

/// Overlay for bodies with no declared length: buffer up to the cap; a
/// body that stays under it gets the banner, anything larger streams
/// through unchanged (the overlay disables itself).
fn overlay_stream(upstream: BodyStream, overlay: OverlayConfig) -> BodyStream {
    futures_util::stream::unfold(
        (upstream, PrefixPhase::Buffering(Vec::new()), overlay),
        |(mut upstream, phase, overlay)| async move {
            match phase {
                PrefixPhase::Buffering(mut buf) => loop {
                    match upstream.next().await {
                        Some(Ok(chunk)) => {
                            buf.extend_from_slice(&chunk);
                            if !overlay.applies_to(buf.len()) {
                                return Some((
                                    Ok(Bytes::from(buf)),
                                    (upstream, PrefixPhase::Streaming, overlay),
                                ));
                            }
                        }
                        Some(Err(e)) => {
                            return Some((Err(e), (upstream, PrefixPhase::Done, overlay)))
                        }
                        None => {
                            let mut out =
                                Vec::with_capacity(overlay.banner.len() + buf.len());
                            out.extend_from_slice(overlay.banner.as_bytes());
                            out.extend_from_slice(&buf);
                            return Some((
                                Ok(Bytes::from(out)),
                                (upstream, PrefixPhase::Done, overlay),
                            ));
                        }
                    }
                },
                PrefixPhase::Streaming => match upstream.next().await {
                    Some(item) => Some((item, (upstream, PrefixPhase::Streaming, overlay))),
                    None => None,
                },
                PrefixPhase::Done => None,
            }
        },
    )
    .boxed()
}

/// True once the buffered prefix pins the injection point: an opened and
/// closed `<head>` tag.
fn injection_point_known(buf: &[u8]) -> bool {
    let mut from = 0;
    loop {
        let Some(rel) = buf[from..]
            .windows(5)
            .position(|w| w.eq_ignore_ascii_case(b"<head"))
        else {
            return false;
        };
        let open = from + rel;
        match buf.get(open + 5) {
            Some(b'>') => return true,
            Some(c) if c.is_ascii_whitespace() => {
                if buf[open + 5..].contains(&b'>') {
                    return true;
                }
            }
            _ => {}
        }
        from = open + 1;
    }
}

fn http_entry(
    method: &str,
    url: &str,
    status: u16,
    headers: Vec<(String, String)>,
    log_body: Option<(String, bool)>,
    duration_ms: u64,
) -> TrafficEntry {
    let (body, body_truncated) = match log_body {
        Some((body, truncated)) => (Some(body), truncated),
        None => (None, false),
    };
    TrafficEntry::http(
        SystemClock.epoch_ms(),
        HttpPayload {
            method: method.to_string(),
            url: url.to_string(),
            status,
            headers,
            body,
            body_truncated,
            duration_ms,
        },
    )
}

fn status_response(status: StatusCode, message: &str) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from(message.to_string()))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
