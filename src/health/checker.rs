//! Single-node reachability probes.
//!
//! # Responsibilities
//! - Probe one node with a fresh connection (no reuse)
//! - Optionally validate the service layer with a HEAD round trip
//! - Map every failure to "unhealthy"; never return an error
//!
//! # Design Decisions
//! - The whole probe shares one deadline, so a slow node cannot stall a sweep
//! - Refused, timed out and protocol failures are logged with distinct causes

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::HealthCheckConfig;
use crate::load_balancer::Node;

/// Probes a node and reports whether it can take traffic.
#[async_trait]
pub trait NodeHealthChecker: Send + Sync {
    async fn is_healthy(&self, node: &Node) -> bool;
}

/// What a probe verifies beyond the TCP handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMode {
    /// Connect only.
    #[default]
    Tcp,
    /// Connect, send `HEAD`, half-close and drain the response.
    Http,
}

/// Default probe deadline.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Probe failures. Only used for logging; callers see a bool.
#[derive(Debug, thiserror::Error)]
enum ProbeError {
    #[error("connection refused")]
    Refused,
    #[error("timed out")]
    Timeout,
    #[error("unexpected response: {0:?}")]
    BadResponse(String),
    #[error("{0}")]
    Io(io::Error),
}

impl From<io::Error> for ProbeError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => ProbeError::Refused,
            io::ErrorKind::TimedOut => ProbeError::Timeout,
            _ => ProbeError::Io(err),
        }
    }
}

/// TCP (and optional HTTP HEAD) health checker.
#[derive(Debug, Clone)]
pub struct TcpHealthChecker {
    timeout: Duration,
    mode: ProbeMode,
    path: String,
}

impl TcpHealthChecker {
    pub fn new(timeout: Duration, mode: ProbeMode) -> Self {
        Self {
            timeout,
            mode,
            path: "/".to_string(),
        }
    }

    pub fn from_config(config: &HealthCheckConfig) -> Self {
        Self {
            timeout: config.timeout(),
            mode: config.probe,
            path: config.path.clone(),
        }
    }

    async fn probe(&self, node: &Node) -> Result<(), ProbeError> {
        let mut stream = TcpStream::connect((node.host(), node.port())).await?;

        if self.mode == ProbeMode::Http {
            let request = format!(
                "HEAD {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: tcp-balancer-health-check\r\nConnection: close\r\n\r\n",
                self.path, node
            );
            stream.write_all(request.as_bytes()).await?;
            stream.shutdown().await?;

            let mut response = Vec::new();
            stream.read_to_end(&mut response).await?;
            if !response.starts_with(b"HTTP/") {
                let head = String::from_utf8_lossy(&response[..response.len().min(32)]);
                return Err(ProbeError::BadResponse(head.into_owned()));
            }
        }

        Ok(())
    }
}

impl Default for TcpHealthChecker {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT, ProbeMode::Tcp)
    }
}

#[async_trait]
impl NodeHealthChecker for TcpHealthChecker {
    async fn is_healthy(&self, node: &Node) -> bool {
        let result = match tokio::time::timeout(self.timeout, self.probe(node)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ProbeError::Timeout),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(node = %node, mode = ?self.mode, cause = %e, "Health probe failed");
                false
            }
        }
    }
}
