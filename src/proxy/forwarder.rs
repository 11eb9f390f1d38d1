//! One backend hop per session.
//!
//! # Responsibilities
//! - Resolve the node host (IPv4 preferred) and connect
//! - Send the synthesized `GET /` request
//! - Read the backend's response until it closes the connection
//!
//! # Design Decisions
//! - Single shot: no retry, no connection reuse
//! - Every network step carries its own deadline
//! - The node's active-connection count is held for the whole hop

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};
use uuid::Uuid;

use crate::config::TimeoutConfig;
use crate::load_balancer::Node;
use crate::observability::metrics;
use crate::resilience::timeouts::{io_timeout, is_timeout};

const READ_CHUNK: usize = 8 * 1024;

/// Why a hop failed. Each variant names the step that failed.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to resolve {node}: {source}")]
    HostResolution {
        node: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to connect to {node}: {source}")]
    Connect {
        node: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to send request to {node}: {source}")]
    Send {
        node: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to receive response from {node}: {source}")]
    Receive {
        node: String,
        #[source]
        source: io::Error,
    },
}

impl ForwardError {
    fn source_io(&self) -> &io::Error {
        match self {
            ForwardError::HostResolution { source, .. }
            | ForwardError::Connect { source, .. }
            | ForwardError::Send { source, .. }
            | ForwardError::Receive { source, .. } => source,
        }
    }

    /// True when the failing step ran out of time.
    pub fn is_timeout(&self) -> bool {
        is_timeout(self.source_io())
    }
}

/// Deadlines for a hop.
#[derive(Debug, Clone, Copy)]
pub struct ForwarderConfig {
    /// Resolve and connect, each.
    pub connect_timeout: Duration,
    /// Each write and each read.
    pub io_timeout: Duration,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self::from(&TimeoutConfig::default())
    }
}

impl From<&TimeoutConfig> for ForwarderConfig {
    fn from(timeouts: &TimeoutConfig) -> Self {
        Self {
            connect_timeout: timeouts.connect(),
            io_timeout: timeouts.io(),
        }
    }
}

/// Executes backend hops.
#[derive(Debug, Clone, Default)]
pub struct RequestForwarder {
    config: ForwarderConfig,
}

impl RequestForwarder {
    pub fn new(config: ForwarderConfig) -> Self {
        Self { config }
    }

    /// The exact bytes sent to every backend.
    pub fn backend_request(node: &Node) -> String {
        format!(
            "GET / HTTP/1.1\r\nHost: {}:{}\r\nConnection: close\r\n\r\n",
            node.host(),
            node.port()
        )
    }

    /// Run one hop against `node` and return everything the backend sent.
    pub async fn forward(&self, node: &Arc<Node>, session_id: Uuid) -> Result<Vec<u8>, ForwardError> {
        let node = node.track_connection();
        let label = node.to_string();
        let start = Instant::now();

        let addr = self.resolve(&node).await.map_err(|source| ForwardError::HostResolution {
            node: label.clone(),
            source,
        })?;

        let mut stream = io_timeout(self.config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|source| ForwardError::Connect {
                node: label.clone(),
                source,
            })?;

        tracing::debug!(session_id = %session_id, node = %label, address = %addr, "Connected to backend");

        let request = Self::backend_request(&node);
        io_timeout(self.config.io_timeout, stream.write_all(request.as_bytes()))
            .await
            .map_err(|source| ForwardError::Send {
                node: label.clone(),
                source,
            })?;

        let mut response = Vec::new();
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            let n = io_timeout(self.config.io_timeout, stream.read(&mut chunk))
                .await
                .map_err(|source| ForwardError::Receive {
                    node: label.clone(),
                    source,
                })?;
            if n == 0 {
                break;
            }
            response.extend_from_slice(&chunk[..n]);
        }

        // The backend already closed its side; a failed shutdown changes nothing.
        let _ = stream.shutdown().await;

        metrics::record_forward_duration(&label, start);
        tracing::debug!(
            session_id = %session_id,
            node = %label,
            bytes = response.len(),
            elapsed = ?start.elapsed(),
            "Backend response received"
        );

        Ok(response)
    }

    async fn resolve(&self, node: &Node) -> io::Result<SocketAddr> {
        let addrs: Vec<SocketAddr> =
            io_timeout(self.config.connect_timeout, lookup_host((node.host(), node.port())))
                .await?
                .collect();

        addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
            })
    }
}
