//! Shared utilities for integration tests.
//!
//! Every mock binds `127.0.0.1:0` and returns its address, so tests never
//! fight over ports.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use edge_gateway::config::EdgeConfig;
use edge_gateway::lifecycle::Shutdown;
use edge_gateway::{EdgeServer, EdgeServices};

pub const SECRET: &str = "integration-test-secret";

/// Response header carrying the echo upstream's name.
pub const UPSTREAM_NAME: &str = "x-upstream-name";

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// An upstream that streams the request body back and reports what it saw
/// in `x-echo-*` response headers.
///
/// `/status/<code>` answers with that status; `/slow` waits 3 seconds first;
/// `/drain` reads the whole request body and answers with its length.
pub async fn start_echo_upstream(name: &'static str) -> SocketAddr {
    serve(Router::new().fallback(move |req: Request<Body>| echo(name, req))).await
}

async fn echo(name: &'static str, req: Request<Body>) -> Response {
    let path = req.uri().path().to_string();
    if let Some(code) = path.strip_prefix("/status/") {
        let status = code
            .parse::<u16>()
            .ok()
            .and_then(|c| StatusCode::from_u16(c).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return Response::builder()
            .status(status)
            .header(UPSTREAM_NAME, name)
            .body(Body::from(format!("status {}", status.as_u16())))
            .unwrap();
    }
    if path == "/drain" {
        let received = axum::body::to_bytes(req.into_body(), usize::MAX).await.unwrap();
        return Response::builder()
            .header(UPSTREAM_NAME, name)
            .body(Body::from(received.len().to_string()))
            .unwrap();
    }
    if path == "/slow" {
        tokio::time::sleep(Duration::from_secs(3)).await;
    }

    let headers = req.headers().clone();
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(UPSTREAM_NAME, name)
        .header("x-echo-method", req.method().as_str())
        .header("x-echo-uri", req.uri().to_string());
    for (seen, reported) in [
        ("x-forwarded-for", "x-echo-forwarded-for"),
        ("host", "x-echo-host"),
        ("x-custom", "x-echo-custom"),
        ("x-request-id", "x-echo-request-id"),
    ] {
        if let Some(value) = headers.get(seen) {
            builder = builder.header(reported, value.clone());
        }
    }
    let hop = headers.contains_key("proxy-connection") || headers.contains_key("x-secret-hop");
    builder = builder.header("x-echo-hop", if hop { "present" } else { "absent" });

    builder.body(req.into_body()).unwrap()
}

/// A whitelist source serving `ips`; the counter tracks fetches.
pub async fn start_whitelist_source(ips: &[&str]) -> (SocketAddr, Arc<AtomicUsize>) {
    let body: Value = ips.iter().map(|ip| json!({ "ip": ip })).collect();
    let fetches = Arc::new(AtomicUsize::new(0));
    let counter = fetches.clone();
    let router = Router::new().fallback(move || {
        let body = body.clone();
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Json(body)
        }
    });
    (serve(router).await, fetches)
}

/// A JSON service always answering `payload`.
pub async fn start_data_service(payload: Value) -> SocketAddr {
    serve(Router::new().fallback(move || {
        let payload = payload.clone();
        async move { Json(payload) }
    }))
    .await
}

/// A service that always answers 500.
pub async fn start_failing_service() -> SocketAddr {
    serve(Router::new().fallback(|| async {
        (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
    }))
    .await
}

/// A loopback address with nothing listening.
pub fn closed_port() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

pub fn config(whitelist: SocketAddr, data: SocketAddr, upstreams: &[SocketAddr]) -> EdgeConfig {
    let mut config = EdgeConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.auth.secret = SECRET.to_string();
    config.whitelist.source_url = format!("http://{}/", whitelist);
    config.data_service.url = format!("http://{}/records", data);
    config.upstreams.targets = upstreams.iter().map(|a| format!("http://{}", a)).collect();
    config.rate_limit.requests_per_second = 1000.0;
    config.rate_limit.burst_size = 1000;
    config
}

/// Build the edge from `config` and serve it in the background.
pub async fn spawn_edge(config: EdgeConfig) -> (SocketAddr, Shutdown) {
    let services = EdgeServices::from_config(&config).unwrap();
    spawn_edge_with(config, services).await
}

pub async fn spawn_edge_with(config: EdgeConfig, services: EdgeServices) -> (SocketAddr, Shutdown) {
    let server = EdgeServer::with_services(config, services);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, receiver).await;
    });
    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
