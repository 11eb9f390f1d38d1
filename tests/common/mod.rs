//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use tcp_balancer::config::{NodeConfig, ProxyConfig};
use tcp_balancer::health::{HealthMonitor, NodeHealthChecker};
use tcp_balancer::load_balancer::{create_strategy, Node, NodeSet, StrategyKind};
use tcp_balancer::proxy::{EngineConfig, ForwarderConfig, ProxyEngine, RequestForwarder};

pub const CLIENT_REQUEST: &[u8] = b"GET /index.html HTTP/1.1\r\nHost: balancer\r\n\r\n";

/// Read until the end of the request header block (or EOF).
async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while let Ok(n) = socket.read(&mut chunk).await {
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
}

/// Start a backend that answers every connection with exactly `bytes`.
pub async fn start_raw_backend(bytes: Vec<u8>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let bytes = Arc::new(bytes);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let bytes = Arc::clone(&bytes);
            tokio::spawn(async move {
                read_request(&mut socket).await;
                let _ = socket.write_all(&bytes).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Start a simple mock backend that returns a fixed HTTP response.
pub async fn start_mock_backend(body: &'static str) -> SocketAddr {
    start_raw_backend(http_response(200, body).into_bytes()).await
}

/// Start a programmable mock backend with async support.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = Arc::clone(&f);
            tokio::spawn(async move {
                read_request(&mut socket).await;
                let (status, body) = f().await;
                let _ = socket.write_all(http_response(status, &body).as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Start a backend that accepts and reads but never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    addr
}

pub fn http_response(status: u16, body: &str) -> String {
    let status_text = match status {
        200 => "200 OK",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    };
    format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_text,
        body.len(),
        body
    )
}

/// A port with nothing listening on it.
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Test config: ephemeral listener port, slow sweep timer, short timeouts.
pub fn config_for(nodes: &[SocketAddr]) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.port = 0;
    config.health_check.interval_ms = 60_000;
    config.health_check.timeout_ms = 200;
    config.timeouts.connect_ms = 500;
    config.timeouts.io_ms = 1_000;
    config.timeouts.request_ms = 3_000;
    config.timeouts.client_read_ms = 1_000;
    config.timeouts.client_write_ms = 1_000;
    config.nodes = nodes
        .iter()
        .map(|addr| NodeConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
        })
        .collect();
    config
}

/// Checker whose verdict for every node is a single switch.
#[derive(Debug, Default)]
pub struct SwitchChecker {
    pub healthy: AtomicBool,
}

impl SwitchChecker {
    pub fn new(healthy: bool) -> Arc<Self> {
        Arc::new(Self {
            healthy: AtomicBool::new(healthy),
        })
    }

    pub fn set(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

#[async_trait]
impl NodeHealthChecker for SwitchChecker {
    async fn is_healthy(&self, _node: &Node) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

/// Build an engine around a caller-supplied checker.
pub async fn engine_with_checker(
    config: &ProxyConfig,
    checker: Arc<dyn NodeHealthChecker>,
) -> ProxyEngine {
    let nodes: NodeSet = config.node_set().unwrap();
    let monitor = Arc::new(HealthMonitor::initialize(nodes, checker).await);
    ProxyEngine::new(
        EngineConfig::from(config),
        monitor,
        create_strategy(StrategyKind::RoundRobin),
        RequestForwarder::new(ForwarderConfig::from(&config.timeouts)),
    )
}

/// Connect to a started engine over IPv4 loopback.
pub async fn connect(engine: &ProxyEngine) -> TcpStream {
    let port = engine.local_addr().expect("engine not started").port();
    TcpStream::connect(("127.0.0.1", port)).await.unwrap()
}

/// Send one request through the engine and collect everything it sends back.
pub async fn roundtrip(engine: &ProxyEngine, request: &[u8]) -> Vec<u8> {
    let mut client = connect(engine).await;
    client.write_all(request).await.unwrap();

    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut response))
        .await
        .expect("balancer did not close the connection")
        .unwrap_or_default();
    response
}
