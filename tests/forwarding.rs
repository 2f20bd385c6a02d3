//! Forwarding through the edge to real upstream servers.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::json;

mod common;

#[tokio::test]
async fn test_round_robin_spreads_evenly() {
    let (whitelist, _) = common::start_whitelist_source(&["127.0.0.1"]).await;
    let data = common::start_data_service(json!([])).await;
    let a = common::start_echo_upstream("a").await;
    let b = common::start_echo_upstream("b").await;
    let c = common::start_echo_upstream("c").await;

    let (edge, _shutdown) = common::spawn_edge(common::config(whitelist, data, &[a, b, c])).await;
    let client = common::client();

    let mut served: HashMap<String, usize> = HashMap::new();
    for _ in 0..30 {
        let res = client.get(format!("http://{}/ping", edge)).send().await.unwrap();
        assert_eq!(res.status(), 200);

        let name = res.headers()[common::UPSTREAM_NAME].to_str().unwrap().to_string();
        let gateway = res.headers()["x-gateway-used"].to_str().unwrap().to_string();
        let expected = match name.as_str() {
            "a" => a,
            "b" => b,
            _ => c,
        };
        assert_eq!(gateway, format!("http://{}", expected));
        *served.entry(name).or_default() += 1;
    }

    assert_eq!(served.len(), 3);
    assert!(served.values().all(|&n| n == 10), "uneven rotation: {:?}", served);
}

#[tokio::test]
async fn test_request_and_response_pass_through() {
    let (whitelist, _) = common::start_whitelist_source(&["127.0.0.1"]).await;
    let data = common::start_data_service(json!([])).await;
    let upstream = common::start_echo_upstream("only").await;

    let (edge, _shutdown) = common::spawn_edge(common::config(whitelist, data, &[upstream])).await;
    let client = common::client();

    for size in [0usize, 1, 64 * 1024, 3 * 1024 * 1024] {
        let payload: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        let res = client
            .post(format!("http://{}/api/v1/items?limit=5&sort=desc", edge))
            .header("x-custom", "kept")
            .header("proxy-connection", "keep-alive")
            .body(payload.clone())
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 200);
        let headers = res.headers().clone();
        assert_eq!(headers["x-echo-method"], "POST");
        assert_eq!(headers["x-echo-uri"], "/api/v1/items?limit=5&sort=desc");
        assert_eq!(headers["x-echo-custom"], "kept");
        assert_eq!(headers["x-echo-forwarded-for"], "127.0.0.1");
        assert_eq!(headers["x-echo-host"].to_str().unwrap(), upstream.to_string());
        assert_eq!(headers["x-echo-hop"], "absent");
        assert_eq!(headers["x-gateway-used"].to_str().unwrap(), format!("http://{}", upstream));
        // The generated request ID travels upstream and back to the caller.
        assert_eq!(headers["x-echo-request-id"], headers["x-request-id"]);

        let body = res.bytes().await.unwrap();
        assert_eq!(body.len(), size);
        assert_eq!(&body[..], &payload[..]);
    }
}

#[tokio::test]
async fn test_existing_forwarded_for_is_appended() {
    let (whitelist, _) = common::start_whitelist_source(&["127.0.0.1"]).await;
    let data = common::start_data_service(json!([])).await;
    let upstream = common::start_echo_upstream("only").await;

    let (edge, _shutdown) = common::spawn_edge(common::config(whitelist, data, &[upstream])).await;
    let res = common::client()
        .get(format!("http://{}/", edge))
        .header("x-forwarded-for", "198.51.100.7")
        .send()
        .await
        .unwrap();

    assert_eq!(res.headers()["x-echo-forwarded-for"], "198.51.100.7, 127.0.0.1");
}

#[tokio::test]
async fn test_upstream_errors_are_not_rewritten() {
    let (whitelist, _) = common::start_whitelist_source(&["127.0.0.1"]).await;
    let data = common::start_data_service(json!([])).await;
    let upstream = common::start_echo_upstream("only").await;

    let (edge, _shutdown) = common::spawn_edge(common::config(whitelist, data, &[upstream])).await;
    let client = common::client();

    for code in [404u16, 500, 503] {
        let res = client
            .get(format!("http://{}/status/{}", edge, code))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status().as_u16(), code);
        assert!(res.headers().contains_key("x-gateway-used"));
        assert_eq!(res.text().await.unwrap(), format!("status {}", code));
    }
}

#[tokio::test]
async fn test_down_target_is_502_and_not_skipped() {
    let (whitelist, _) = common::start_whitelist_source(&["127.0.0.1"]).await;
    let data = common::start_data_service(json!([])).await;
    let up = common::start_echo_upstream("up").await;
    let down = common::closed_port();

    let (edge, _shutdown) = common::spawn_edge(common::config(whitelist, data, &[up, down])).await;
    let client = common::client();

    let mut statuses = Vec::new();
    for _ in 0..4 {
        let res = client.get(format!("http://{}/", edge)).send().await.unwrap();
        let status = res.status().as_u16();
        if status == 502 {
            let body = res.text().await.unwrap();
            assert!(!body.contains(&down.to_string()), "{body}");
            assert!(body.contains("upstream unavailable"), "{body}");
        }
        statuses.push(status);
    }
    statuses.sort_unstable();
    assert_eq!(statuses, vec![200, 200, 502, 502]);
}

#[tokio::test]
async fn test_slow_upstream_is_504() {
    let (whitelist, _) = common::start_whitelist_source(&["127.0.0.1"]).await;
    let data = common::start_data_service(json!([])).await;
    let upstream = common::start_echo_upstream("slow").await;

    let mut config = common::config(whitelist, data, &[upstream]);
    config.timeouts.upstream_secs = 1;
    let (edge, _shutdown) = common::spawn_edge(config).await;

    let res = common::client()
        .get(format!("http://{}/slow", edge))
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 504);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["message"], "upstream timed out");
}

#[tokio::test]
async fn test_slow_steady_upload_is_not_timed_out() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let (whitelist, _) = common::start_whitelist_source(&["127.0.0.1"]).await;
    let data = common::start_data_service(json!([])).await;
    let upstream = common::start_echo_upstream("drain").await;

    let mut config = common::config(whitelist, data, &[upstream]);
    config.timeouts.upstream_secs = 1;
    let (edge, _shutdown) = common::spawn_edge(config).await;

    let mut stream = tokio::net::TcpStream::connect(edge).await.unwrap();
    let head = format!(
        "POST /drain HTTP/1.1\r\nHost: {}\r\nContent-Length: 4096\r\nConnection: close\r\n\r\n",
        edge
    );
    stream.write_all(head.as_bytes()).await.unwrap();
    for _ in 0..4 {
        stream.write_all(&[b'x'; 1024]).await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    let mut raw = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), stream.read_to_end(&mut raw))
        .await
        .unwrap()
        .unwrap();
    let raw = String::from_utf8_lossy(&raw);
    assert!(raw.starts_with("HTTP/1.1 200"), "{raw}");
    assert!(raw.ends_with("4096"), "{raw}");
}
