// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::traffic_log::LogQuery;
use agnt_core::{ChaosPreset, OverlayConfig};
use axum::response::Html;
use axum::routing::get;
use axum::Json;
use futures_util::{SinkExt, StreamExt};
use std::net::TcpListener as StdTcpListener;

const PAGE: &str = "<html><head><title>t</title></head><body>hello</body></html>";

fn free_port() -> u16 {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn spawn_upstream() -> u16 {
    let app = axum::Router::new()
        .route("/", get(|| async { Html(PAGE) }))
        .route("/plain", get(|| async { "plain-body" }))
        .route("/big", get(|| async { "x".repeat(100 * 1024) }))
        .route(
            "/chunked",
            get(|| async {
                // No Content-Length: the body arrives as chunks.
                let chunks: Vec<Result<bytes::Bytes, std::io::Error>> = vec![
                    Ok(bytes::Bytes::from_static(b"chunk-one-")),
                    Ok(bytes::Bytes::from_static(b"chunk-two")),
                ];
                axum::response::Response::builder()
                    .header(header::CONTENT_TYPE, "text/plain")
                    .body(axum::body::Body::from_stream(futures_util::stream::iter(chunks)))
                    .unwrap()
            }),
        )
        .route("/api/users", get(|| async { Json(serde_json::json!({"users": []})) }))
        .route(
            "/echo",
            get(|ws: axum::extract::WebSocketUpgrade| async move {
                ws.on_upgrade(|mut socket| async move {
                    while let Some(Ok(message)) = socket.recv().await {
                        if socket.send(message).await.is_err() {
                            break;
                        }
                    }
                })
            }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    port
}

async fn running_instance(upstream_port: u16) -> Arc<ProxyInstance> {
    let instance = ProxyInstance::new(ProxySettings {
        proxy_id: "app".into(),
        target: format!("http://127.0.0.1:{upstream_port}").parse().unwrap(),
        port: free_port(),
        explicit_port: true,
        project_path: std::env::temp_dir(),
        chaos: None,
        overlay: None,
        event_tx: None,
    })
    .unwrap();
    instance.start().await.unwrap();

    for _ in 0..200 {
        if instance.state() == ProxyState::Running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert_eq!(instance.state(), ProxyState::Running);
    instance
}

#[tokio::test]
async fn html_responses_get_the_script_tag() {
    let upstream = spawn_upstream().await;
    let instance = running_instance(upstream).await;

    let resp = reqwest::get(format!("http://127.0.0.1:{}/", instance.port())).await.unwrap();
    assert_eq!(resp.status(), 200);
    let declared_len: usize =
        resp.headers()[header::CONTENT_LENGTH].to_str().unwrap().parse().unwrap();
    let body = resp.text().await.unwrap();

    assert!(body.contains("<head><script src=\"/__devtool_client.js\""), "{body}");
    assert_eq!(body.len(), declared_len, "Content-Length must match the new body");
    assert_eq!(body.len(), PAGE.len() + HtmlInjector::new("app", SCRIPT_PATH, None).added_len());

    instance.stop().await.unwrap();
}

#[tokio::test]
async fn non_html_bodies_pass_untouched() {
    let upstream = spawn_upstream().await;
    let instance = running_instance(upstream).await;

    let body = reqwest::get(format!("http://127.0.0.1:{}/plain", instance.port()))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "plain-body");

    instance.stop().await.unwrap();
}

#[tokio::test]
async fn script_bundle_is_served_with_immutable_caching() {
    let upstream = spawn_upstream().await;
    let instance = running_instance(upstream).await;

    let resp = reqwest::get(format!("http://127.0.0.1:{}{}", instance.port(), SCRIPT_PATH))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers()[header::CACHE_CONTROL].to_str().unwrap().contains("immutable"));
    let body = resp.text().await.unwrap();
    assert!(body.contains("\"app\""), "bundle carries the proxy id");

    instance.stop().await.unwrap();
}

#[tokio::test]
async fn overlay_prepends_banner_to_text_responses() {
    let upstream = spawn_upstream().await;
    let instance = running_instance(upstream).await;
    instance.set_overlay(Some(OverlayConfig::new("[rebuilding] ")));

    let body = reqwest::get(format!("http://127.0.0.1:{}/plain", instance.port()))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "[rebuilding] plain-body");

    instance.stop().await.unwrap();
}

#[tokio::test]
async fn overlay_applies_to_streamed_bodies_with_known_length() {
    // 100 KiB is past the buffering threshold but well under the overlay
    // cap; the banner must still arrive.
    let upstream = spawn_upstream().await;
    let instance = running_instance(upstream).await;
    instance.set_overlay(Some(OverlayConfig::new("[banner] ")));

    let resp = reqwest::get(format!("http://127.0.0.1:{}/big", instance.port())).await.unwrap();
    let declared_len: usize =
        resp.headers()[header::CONTENT_LENGTH].to_str().unwrap().parse().unwrap();
    let body = resp.text().await.unwrap();

    assert!(body.starts_with("[banner] "), "{}", &body[..32]);
    assert_eq!(body.len(), 100 * 1024 + "[banner] ".len());
    assert_eq!(declared_len, body.len());

    instance.stop().await.unwrap();
}

#[tokio::test]
async fn overlay_applies_to_chunked_responses_under_cap() {
    let upstream = spawn_upstream().await;
    let instance = running_instance(upstream).await;
    instance.set_overlay(Some(OverlayConfig::new("[banner] ")));

    let resp =
        reqwest::get(format!("http://127.0.0.1:{}/chunked", instance.port())).await.unwrap();
    assert!(resp.headers().get(header::CONTENT_LENGTH).is_none(), "stays chunked");
    let body = resp.text().await.unwrap();
    assert_eq!(body, "[banner] chunk-one-chunk-two");

    instance.stop().await.unwrap();
}

#[tokio::test]
async fn overlay_disables_on_chunked_responses_over_cap() {
    let upstream = spawn_upstream().await;
    let instance = running_instance(upstream).await;
    instance.set_overlay(Some(OverlayConfig { banner: "[banner] ".into(), size_cap: 4 }));

    let body = reqwest::get(format!("http://127.0.0.1:{}/chunked", instance.port()))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "chunk-one-chunk-two");

    instance.stop().await.unwrap();
}

#[tokio::test]
async fn overlay_skips_streamed_bodies_over_its_cap() {
    let upstream = spawn_upstream().await;
    let instance = running_instance(upstream).await;
    instance.set_overlay(Some(OverlayConfig { banner: "[banner] ".into(), size_cap: 70 * 1024 }));

    let body = reqwest::get(format!("http://127.0.0.1:{}/big", instance.port()))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body.len(), 100 * 1024, "cap beats the banner");
    assert!(!body.starts_with("[banner]"));

    instance.stop().await.unwrap();
}

#[tokio::test]
async fn overlay_skips_oversized_bodies() {
    let upstream = spawn_upstream().await;
    let instance = running_instance(upstream).await;
    instance.set_overlay(Some(OverlayConfig { banner: "B".into(), size_cap: 3 }));

    let body = reqwest::get(format!("http://127.0.0.1:{}/plain", instance.port()))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "plain-body");

    instance.stop().await.unwrap();
}

#[tokio::test]
async fn chaos_offline_drops_requests() {
    let upstream = spawn_upstream().await;
    let instance = running_instance(upstream).await;
    instance.set_chaos(Some(ChaosPreset::Offline.config()));

    let resp = reqwest::get(format!("http://127.0.0.1:{}/", instance.port())).await.unwrap();
    assert_eq!(resp.status(), 502);

    instance.set_chaos(None);
    let resp = reqwest::get(format!("http://127.0.0.1:{}/", instance.port())).await.unwrap();
    assert_eq!(resp.status(), 200);

    instance.stop().await.unwrap();
}

#[tokio::test]
async fn chaos_status_override_short_circuits() {
    let upstream = spawn_upstream().await;
    let instance = running_instance(upstream).await;
    let mut config = agnt_core::ChaosConfig::default();
    config.status_overrides.insert("/api".into(), 503);
    instance.set_chaos(Some(config));

    let resp =
        reqwest::get(format!("http://127.0.0.1:{}/api/users", instance.port())).await.unwrap();
    assert_eq!(resp.status(), 503);

    instance.stop().await.unwrap();
}

#[tokio::test]
async fn traffic_log_records_http_with_body_sample() {
    let upstream = spawn_upstream().await;
    let instance = running_instance(upstream).await;

    reqwest::get(format!("http://127.0.0.1:{}/api/users", instance.port()))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    let entries = instance
        .traffic
        .query(&LogQuery { kind: Some(TrafficKind::Http), ..Default::default() });
    assert_eq!(entries.len(), 1);
    let http = entries[0].as_http().unwrap();
    assert_eq!(http.method, "GET");
    assert_eq!(http.status, 200);
    assert_eq!(http.url, "/api/users");
    assert!(http.body.as_deref().unwrap().contains("users"));

    instance.stop().await.unwrap();
}

#[tokio::test]
async fn websocket_upgrade_passes_through_to_upstream() {
    let upstream = spawn_upstream().await;
    let instance = running_instance(upstream).await;

    let (mut socket, _) = tokio_tungstenite::connect_async(format!(
        "ws://127.0.0.1:{}/echo",
        instance.port()
    ))
    .await
    .unwrap();

    socket
        .send(tokio_tungstenite::tungstenite::Message::Text("around the world".into()))
        .await
        .unwrap();
    let reply = tokio::time::timeout(Duration::from_secs(2), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(reply.into_text().unwrap().as_str(), "around the world");

    instance.stop().await.unwrap();
}

#[tokio::test]
async fn dead_upstream_fails_after_dial_budget() {
    let instance = ProxyInstance::new(ProxySettings {
        proxy_id: "dead".into(),
        target: format!("http://127.0.0.1:{}", free_port()).parse().unwrap(),
        port: free_port(),
        explicit_port: true,
        project_path: std::env::temp_dir(),
        chaos: None,
        overlay: None,
        event_tx: None,
    })
    .unwrap();
    instance.start().await.unwrap();
    assert_eq!(instance.state(), ProxyState::Starting);

    // Requests during Starting surface upstream failure as 502 and log it.
    let resp = reqwest::get(format!("http://127.0.0.1:{}/", instance.port())).await.unwrap();
    assert_eq!(resp.status(), 502);
    assert!(!instance
        .traffic
        .query(&LogQuery { kind: Some(TrafficKind::Error), ..Default::default() })
        .is_empty());

    // Five dial misses inside the window pin the proxy in Failed.
    for _ in 0..400 {
        if instance.state() == ProxyState::Failed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert_eq!(instance.state(), ProxyState::Failed);
}

#[tokio::test]
async fn stop_closes_browser_channels_and_settles_stopped() {
    let upstream = spawn_upstream().await;
    let instance = running_instance(upstream).await;

    let (mut socket, _) = tokio_tungstenite::connect_async(format!(
        "ws://127.0.0.1:{}{}",
        instance.port(),
        crate::METRICS_PATH
    ))
    .await
    .unwrap();

    for _ in 0..100 {
        if !instance.channels.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(instance.channels.len(), 1);

    instance.stop().await.unwrap();
    assert_eq!(instance.state(), ProxyState::Stopped);

    // The browser side observes a close (or the connection dropping).
    let next = tokio::time::timeout(Duration::from_secs(2), socket.next()).await.unwrap();
    match next {
        None | Some(Err(_)) => {}
        Some(Ok(message)) => assert!(message.is_close(), "expected close, got {message:?}"),
    }
}
