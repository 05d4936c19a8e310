//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use marketplace_gate::auth::MemorySessionProvider;
use marketplace_gate::config::GateConfig;
use marketplace_gate::security::rate_limit;
use marketplace_gate::verification::{MemoryVerificationStore, UserStatusStore};
use marketplace_gate::{GateServices, HttpServer, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Start a mock page server that answers every request with
/// `<path-and-query> ip=<x-real-ip>`.
pub async fn start_mock_upstream(addr: SocketAddr) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let head = read_head(&mut socket).await;
                        let target = head
                            .lines()
                            .next()
                            .and_then(|line| line.split_whitespace().nth(1))
                            .unwrap_or("?")
                            .to_string();
                        let real_ip = head
                            .lines()
                            .find_map(|line| {
                                let (name, value) = line.split_once(':')?;
                                name.eq_ignore_ascii_case("x-real-ip").then(|| value.trim().to_string())
                            })
                            .unwrap_or_default();

                        let body = format!("{target} ip={real_ip}");
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

async fn read_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

pub fn test_config(gate_addr: SocketAddr, upstream_addr: SocketAddr) -> GateConfig {
    let mut config = GateConfig::default();
    config.listener.bind_address = gate_addr.to_string();
    config.upstream.address = upstream_addr.to_string();
    config.observability.metrics_enabled = false;
    config
}

pub struct TestGate {
    pub sessions: Arc<MemorySessionProvider>,
    pub store: Arc<MemoryVerificationStore>,
    pub shutdown: Shutdown,
    pub base_url: String,
}

/// Start the gate with in-memory sessions and store.
pub async fn start_gate(config: GateConfig) -> TestGate {
    let store = Arc::new(MemoryVerificationStore::new(None));
    start_gate_with_user_store(config, store.clone(), store).await
}

pub async fn start_gate_with_user_store(
    config: GateConfig,
    store: Arc<MemoryVerificationStore>,
    user_store: Arc<dyn UserStatusStore>,
) -> TestGate {
    let sessions = Arc::new(MemorySessionProvider::new());
    let services = GateServices {
        sessions: sessions.clone(),
        verification_store: store.clone(),
        user_store,
        limiter: rate_limit::from_config(&config.rate_limit),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let server = HttpServer::with_services(config, services).unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let (_tx, config_updates) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, rx).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestGate {
        sessions,
        store,
        shutdown,
        base_url,
    }
}

/// Client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
