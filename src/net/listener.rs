//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind all interfaces, dual-stack where the host supports it
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore
//! - Graceful handling of accept errors

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },
    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] io::Error),
}

/// A bounded TCP listener that limits concurrent connections.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is reached,
/// new connections are closed right after accept, so the accept loop itself
/// never waits for a slot.
#[derive(Debug)]
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Semaphore to limit concurrent connections.
    connection_limit: Arc<Semaphore>,
    /// Configured maximum connections.
    max_connections: usize,
}

impl Listener {
    /// Bind `[::]:port`, falling back to `0.0.0.0:port` on hosts without IPv6.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let v6 = SocketAddr::from((Ipv6Addr::UNSPECIFIED, config.port));
        let listener = match TcpListener::bind(v6).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::debug!(error = %e, "IPv6 bind failed, falling back to IPv4");
                let v4 = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
                TcpListener::bind(v4)
                    .await
                    .map_err(|source| ListenerError::Bind {
                        port: config.port,
                        source,
                    })?
            }
        };

        let local_addr = listener.local_addr().map_err(|source| ListenerError::Bind {
            port: config.port,
            source,
        })?;

        tracing::info!(
            address = %local_addr,
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
        })
    }

    /// Accept the next connection that fits under the limit.
    ///
    /// Connections arriving while every slot is taken are dropped (closed)
    /// and the call keeps waiting for the next one.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        loop {
            let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

            match Arc::clone(&self.connection_limit).try_acquire_owned() {
                Ok(permit) => {
                    tracing::debug!(
                        peer_addr = %addr,
                        available_permits = self.connection_limit.available_permits(),
                        "Connection accepted"
                    );
                    return Ok((stream, addr, ConnectionPermit { _permit: permit }));
                }
                Err(_) => {
                    tracing::warn!(
                        peer_addr = %addr,
                        max_connections = self.max_connections,
                        "Connection rejected: max connections reached"
                    );
                    drop(stream);
                }
            }
        }
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    /// Get configured maximum connections.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released back to the pool.
/// This holds even if the session task panics.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}
