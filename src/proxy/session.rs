//! Per-connection session pipeline.
//!
//! # Responsibilities
//! - Read the client's request up to the end of its header block
//! - Pick a node from the current snapshot
//! - Run one backend hop and relay its bytes verbatim
//! - Close the client connection exactly once, on every path
//!
//! # State Machine
//! ```text
//! Accepted → ReceivingRequest → Routed → Forwarding → RelayingResponse → Closed
//!                  │               │          │               │
//!                  └───────────────┴──────────┴───────────────┴──→ Closed
//! ```

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use uuid::Uuid;

use crate::config::ProxyConfig;
use crate::health::HealthMonitor;
use crate::load_balancer::{Node, RoutingStrategy};
use crate::observability::metrics;
use crate::proxy::forwarder::{ForwardError, RequestForwarder};
use crate::resilience::timeouts::io_timeout;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const READ_CHUNK: usize = 4 * 1024;

/// Where a session is in its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Accepted,
    ReceivingRequest,
    Routed,
    Forwarding,
    RelayingResponse,
    Closed,
}

/// Terminal failures of a session. None of them produce a response.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no healthy node available")]
    NoHealthyNode,

    #[error("client closed the connection before the request was complete")]
    ClientClosed,

    #[error("request header exceeded {limit} bytes")]
    HeaderTooLarge { limit: usize },

    #[error("client I/O failed: {0}")]
    Client(#[source] io::Error),

    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error("forwarding cancelled after {0:?}")]
    Cancelled(Duration),
}

impl SessionError {
    /// Short label used for the outcome metric.
    pub fn outcome(&self) -> &'static str {
        match self {
            SessionError::NoHealthyNode => "no_healthy_node",
            SessionError::ClientClosed => "client_closed",
            SessionError::HeaderTooLarge { .. } => "header_too_large",
            SessionError::Client(_) => "client_error",
            SessionError::Forward(_) => "forward_error",
            SessionError::Cancelled(_) => "cancelled",
        }
    }
}

/// Limits applied to every session.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Each client read while receiving the request.
    pub client_read_timeout: Duration,
    /// Writing the whole response back to the client.
    pub client_write_timeout: Duration,
    /// The whole backend hop.
    pub request_timeout: Duration,
    /// Largest accepted request header block.
    pub max_header_bytes: usize,
}

impl From<&ProxyConfig> for SessionSettings {
    fn from(config: &ProxyConfig) -> Self {
        Self {
            client_read_timeout: config.timeouts.client_read(),
            client_write_timeout: config.timeouts.client_write(),
            request_timeout: config.timeouts.request(),
            max_header_bytes: config.limits.max_request_header_bytes,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&ProxyConfig::default())
    }
}

/// Everything a session borrows from the engine.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub monitor: Arc<HealthMonitor>,
    pub strategy: Arc<dyn RoutingStrategy>,
    pub forwarder: Arc<RequestForwarder>,
    pub settings: SessionSettings,
}

/// One accepted client connection.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    peer: SocketAddr,
    started: Instant,
    state: SessionState,
    target: Option<Arc<Node>>,
    request: Vec<u8>,
    client: TcpStream,
}

impl Session {
    pub fn new(client: TcpStream, peer: SocketAddr) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer,
            started: Instant::now(),
            state: SessionState::Accepted,
            target: None,
            request: Vec::new(),
            client,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Drive the session to `Closed`. The client socket is dropped on return.
    pub async fn run(mut self, ctx: &SessionContext) {
        match self.drive(ctx).await {
            Ok(bytes) => {
                metrics::record_session_outcome("relayed");
                tracing::debug!(
                    node = %self.target_label(),
                    bytes,
                    elapsed = ?self.started.elapsed(),
                    "Session complete"
                );
            }
            Err(e) => {
                metrics::record_session_outcome(e.outcome());
                match &e {
                    SessionError::ClientClosed => tracing::debug!("Client closed before sending a request"),
                    SessionError::NoHealthyNode => tracing::warn!("No healthy node available, closing session"),
                    SessionError::Forward(fe) => tracing::warn!(
                        node = %self.target_label(),
                        timeout = fe.is_timeout(),
                        error = %fe,
                        "Forwarding failed"
                    ),
                    other => tracing::warn!(
                        node = %self.target_label(),
                        state = ?self.state,
                        error = %other,
                        "Session failed"
                    ),
                }
            }
        }

        self.transition(SessionState::Closed);
    }

    async fn drive(&mut self, ctx: &SessionContext) -> Result<usize, SessionError> {
        self.transition(SessionState::ReceivingRequest);
        self.receive_request(&ctx.settings).await?;

        let node = ctx
            .strategy
            .next_node(&ctx.monitor.available_nodes())
            .ok_or(SessionError::NoHealthyNode)?;
        self.target = Some(Arc::clone(&node));
        self.transition(SessionState::Routed);

        self.transition(SessionState::Forwarding);
        let limit = ctx.settings.request_timeout;
        let response = tokio::time::timeout(limit, ctx.forwarder.forward(&node, self.id))
            .await
            .map_err(|_| SessionError::Cancelled(limit))??;

        self.transition(SessionState::RelayingResponse);
        let write_limit = ctx.settings.client_write_timeout;
        io_timeout(write_limit, self.client.write_all(&response))
            .await
            .map_err(SessionError::Client)?;
        // Peer may already be gone; the bytes were handed to the kernel.
        let _ = io_timeout(write_limit, self.client.shutdown()).await;

        Ok(response.len())
    }

    async fn receive_request(&mut self, settings: &SessionSettings) -> Result<(), SessionError> {
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            let n = io_timeout(settings.client_read_timeout, self.client.read(&mut chunk))
                .await
                .map_err(SessionError::Client)?;
            if n == 0 {
                return Err(SessionError::ClientClosed);
            }

            let searched = self.request.len().saturating_sub(HEADER_TERMINATOR.len() - 1);
            self.request.extend_from_slice(&chunk[..n]);

            if let Some(end) = find_header_end(&self.request[searched..]) {
                if searched + end > settings.max_header_bytes {
                    return Err(SessionError::HeaderTooLarge {
                        limit: settings.max_header_bytes,
                    });
                }
                tracing::trace!(bytes = self.request.len(), "Request header received");
                return Ok(());
            }
            if self.request.len() > settings.max_header_bytes {
                return Err(SessionError::HeaderTooLarge {
                    limit: settings.max_header_bytes,
                });
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        tracing::trace!(from = ?self.state, to = ?next, "Session state");
        self.state = next;
    }

    fn target_label(&self) -> String {
        self.target
            .as_ref()
            .map_or_else(|| "none".to_string(), |n| n.to_string())
    }
}

/// Length of the header block including its terminator, if complete.
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
        .map(|i| i + HEADER_TERMINATOR.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_end_found_after_terminator() {
        let buf = b"GET / HTTP/1.1\r\nHost: x\r\n\r\nbody";
        assert_eq!(find_header_end(buf), Some(buf.len() - 4));
    }

    #[test]
    fn partial_header_has_no_end() {
        assert_eq!(find_header_end(b"GET / HTTP/1.1\r\nHost: x\r\n"), None);
        assert_eq!(find_header_end(b""), None);
    }

    #[test]
    fn error_outcomes_are_distinct() {
        let outcomes = [
            SessionError::NoHealthyNode.outcome(),
            SessionError::ClientClosed.outcome(),
            SessionError::HeaderTooLarge { limit: 1 }.outcome(),
            SessionError::Client(io::ErrorKind::BrokenPipe.into()).outcome(),
            SessionError::Cancelled(Duration::from_secs(1)).outcome(),
        ];
        let unique: std::collections::HashSet<_> = outcomes.iter().collect();
        assert_eq!(unique.len(), outcomes.len());
    }
}
