//! Concurrent load against the per-IP limiter.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use marketplace_gate::security::{FixedWindowLimiter, RateLimiter};
use reqwest::StatusCode;

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_limit_holds_under_concurrent_tasks() {
    let limiter = Arc::new(FixedWindowLimiter::new(100, Duration::from_secs(60)));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let limiter = limiter.clone();
        handles.push(tokio::spawn(async move {
            let mut allowed = 0u32;
            for _ in 0..25 {
                if limiter.check("192.0.2.1") {
                    allowed += 1;
                }
                tokio::task::yield_now().await;
            }
            allowed
        }));
    }

    let mut total = 0;
    for handle in handles {
        total += handle.await.unwrap();
    }
    assert_eq!(total, 100);
    assert_eq!(limiter.count("192.0.2.1"), Some(100));
    assert_eq!(limiter.tracked_clients(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_through_gate() {
    let gate_addr: SocketAddr = "127.0.0.1:28501".parse().unwrap();
    let upstream_addr: SocketAddr = "127.0.0.1:28502".parse().unwrap();
    common::start_mock_upstream(upstream_addr).await;

    let mut config = common::test_config(gate_addr, upstream_addr);
    config.rate_limit.max_requests = 20;
    let gate = common::start_gate(config).await;
    let client = common::client();

    let mut handles = Vec::new();
    for _ in 0..50 {
        let client = client.clone();
        let url = format!("{}/", gate.base_url);
        handles.push(tokio::spawn(async move {
            client
                .get(url)
                .header("cf-connecting-ip", "192.0.2.44")
                .send()
                .await
                .map(|res| res.status())
        }));
    }

    let mut ok = 0;
    let mut limited = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(StatusCode::OK) => ok += 1,
            Ok(StatusCode::TOO_MANY_REQUESTS) => limited += 1,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
    assert_eq!(ok, 20);
    assert_eq!(limited, 30);

    gate.shutdown.trigger();
}
