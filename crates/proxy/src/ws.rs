// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket surfaces: the `/__devtool_metrics` shim and upstream
//! pass-through for application sockets.
//!
//! Each accepted metrics connection becomes a browser channel. Inbound
//! frames are typed JSON carrying one traffic entry each; execution
//! responses resolve the proxy's pending correlation table.

use std::sync::Arc;

use agnt_core::{Clock, SystemClock, TrafficEntry, TrafficKind};
use axum::body::Body;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tracing::{debug, warn};

use crate::channel::{BrowserChannel, PageInfo};
use crate::instance::ProxyInstance;

/// Handler for the reserved metrics path.
pub async fn metrics_ws(
    ws: WebSocketUpgrade,
    State(instance): State<Arc<ProxyInstance>>,
) -> Response<Body> {
    ws.on_upgrade(move |socket| browser_session(socket, instance)).into_response()
}

/// Run one browser channel until either side closes.
async fn browser_session(socket: WebSocket, instance: Arc<ProxyInstance>) {
    let channel = Arc::new(BrowserChannel::new(uuid::Uuid::new_v4().to_string()));
    channel.touch(SystemClock.epoch_ms());
    instance.channels.attach(Arc::clone(&channel));
    debug!(proxy = %instance.id(), channel = %channel.id, "browser channel opened");

    let (mut sink, mut source) = socket.split();

    // Writer: drain the channel's send queue onto the socket.
    let writer_channel = Arc::clone(&channel);
    let writer = tokio::spawn(async move {
        while let Some(frame) = writer_channel.pop().await {
            if sink.send(Message::Text(frame.to_json().into())).await.is_err() {
                break;
            }
        }
        // Normal close code toward the browser.
        let _ = sink.send(Message::Close(None)).await;
    });

    // Reader: every frame is one traffic entry.
    while let Some(message) = source.next().await {
        match message {
            Ok(Message::Text(text)) => {
                channel.touch(SystemClock.epoch_ms());
                handle_frame(&instance, &channel, text.as_str());
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    instance.channels.detach(&channel.id);
    let _ = writer.await;
    debug!(proxy = %instance.id(), channel = %channel.id, "browser channel closed");
}

/// Decode one inbound frame and route it.
fn handle_frame(instance: &Arc<ProxyInstance>, channel: &Arc<BrowserChannel>, raw: &str) {
    let Ok(frame) = serde_json::from_str::<Value>(raw) else {
        warn!(proxy = %instance.id(), "unparseable browser frame");
        return;
    };
    let Some(kind_str) = frame.get("type").and_then(Value::as_str) else {
        return;
    };
    let correlation_id =
        frame.get("correlation_id").and_then(Value::as_str).map(str::to_string);
    let payload = frame.get("payload").cloned().unwrap_or(Value::Null);

    // Track the page the channel is looking at, for CURRENTPAGE.
    if let Some(url) = payload.get("url").and_then(Value::as_str) {
        channel.set_page(PageInfo {
            url: url.to_string(),
            title: payload.get("title").and_then(Value::as_str).map(str::to_string),
            seen_at_ms: SystemClock.epoch_ms(),
        });
    }

    let Ok(kind) = kind_str.parse::<TrafficKind>() else {
        debug!(proxy = %instance.id(), kind = kind_str, "ignoring unknown frame type");
        return;
    };

    if kind == TrafficKind::Response {
        // Orphan responses are dropped entirely.
        let Some(cid) = correlation_id.as_deref() else {
            return;
        };
        if !instance.resolve_exec(cid, payload.clone()) {
            return;
        }
    }

    instance.log_entry(TrafficEntry::browser(
        SystemClock.epoch_ms(),
        kind,
        correlation_id,
        payload,
    ));
}

/// Bridge a non-reserved WebSocket upgrade to the upstream target.
pub async fn passthrough(instance: Arc<ProxyInstance>, req: Request<Body>) -> Response<Body> {
    let path_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let (mut parts, _body) = req.into_parts();
    let upgrade = match <WebSocketUpgrade as axum::extract::FromRequestParts<()>>::from_request_parts(
        &mut parts,
        &(),
    )
    .await
    {
        Ok(upgrade) => upgrade,
        Err(_) => {
            return Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .body(Body::from("bad websocket upgrade"))
                .unwrap_or_else(|_| Response::new(Body::empty()));
        }
    };

    let mut upstream_url = instance.settings.target.clone();
    let scheme = if upstream_url.scheme() == "https" { "wss" } else { "ws" };
    if upstream_url.set_scheme(scheme).is_err() {
        return Response::builder()
            .status(StatusCode::BAD_GATEWAY)
            .body(Body::from("bad upstream scheme"))
            .unwrap_or_else(|_| Response::new(Body::empty()));
    }
    let target = format!("{}{}", upstream_url.as_str().trim_end_matches('/'), path_query);

    let id = instance.id().to_string();
    upgrade
        .on_upgrade(move |client| async move {
            match tokio_tungstenite::connect_async(target.as_str()).await {
                Ok((upstream, _)) => bridge(client, upstream).await,
                Err(e) => {
                    warn!(proxy = %id, target = %target, error = %e, "upstream websocket dial failed");
                }
            }
        })
        .into_response()
}

type UpstreamWs =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Copy frames both ways until either side closes.
async fn bridge(client: WebSocket, upstream: UpstreamWs) {
    use tokio_tungstenite::tungstenite::Message as Up;

    let (mut client_sink, mut client_source) = client.split();
    let (mut upstream_sink, mut upstream_source) = upstream.split();

    let to_upstream = async {
        while let Some(Ok(message)) = client_source.next().await {
            let converted = match message {
                Message::Text(text) => Up::Text(text.as_str().into()),
                Message::Binary(data) => Up::Binary(data),
                Message::Ping(data) => Up::Ping(data),
                Message::Pong(data) => Up::Pong(data),
                Message::Close(_) => break,
            };
            if upstream_sink.send(converted).await.is_err() {
                break;
            }
        }
        let _ = upstream_sink.send(Up::Close(None)).await;
    };

    let to_client = async {
        while let Some(Ok(message)) = upstream_source.next().await {
            let converted = match message {
                Up::Text(text) => Message::Text(text.as_str().into()),
                Up::Binary(data) => Message::Binary(data),
                Up::Ping(data) => Message::Ping(data),
                Up::Pong(data) => Message::Pong(data),
                Up::Close(_) => break,
                Up::Frame(_) => continue,
            };
            if client_sink.send(converted).await.is_err() {
                break;
            }
        }
        let _ = client_sink.send(Message::Close(None)).await;
    };

    tokio::join!(to_upstream, to_client);
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
