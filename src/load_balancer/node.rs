//! Backend node abstraction.
//!
//! # Responsibilities
//! - Represent a single backend endpoint (host + port)
//! - Validate identity at construction
//! - Compare nodes case-insensitively on host
//! - Track active connections (reserved; not read by any strategy)

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// Errors raised when constructing a [`Node`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NodeError {
    /// Host was empty or whitespace only.
    #[error("node host cannot be empty or whitespace")]
    EmptyHost,

    /// Port was zero.
    #[error("node port must be greater than zero (got {0})")]
    InvalidPort(u16),
}

/// A single backend node.
#[derive(Debug)]
pub struct Node {
    host: String,
    port: u16,
    /// Connections currently being forwarded to this node.
    active_connections: AtomicUsize,
}

impl Node {
    /// Create a new node, rejecting empty hosts and port 0.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, NodeError> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(NodeError::EmptyHost);
        }
        if port == 0 {
            return Err(NodeError::InvalidPort(port));
        }

        Ok(Self {
            host,
            port,
            active_connections: AtomicUsize::new(0),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the current number of in-flight forwards.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Count a forward against this node until the returned guard is dropped.
    pub fn track_connection(self: &Arc<Self>) -> NodeConnectionGuard {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        NodeConnectionGuard {
            node: Arc::clone(self),
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.port == other.port && self.host.eq_ignore_ascii_case(&other.host)
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host.to_ascii_lowercase().hash(state);
        self.port.hash(state);
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A RAII guard that manages the active connection count.
#[derive(Debug)]
pub struct NodeConnectionGuard {
    node: Arc<Node>,
}

impl Deref for NodeConnectionGuard {
    type Target = Node;
    fn deref(&self) -> &Self::Target {
        &self.node
    }
}

impl Drop for NodeConnectionGuard {
    fn drop(&mut self) {
        self.node.active_connections.fetch_sub(1, Ordering::Relaxed);
    }
}

/// The full configured roster. Fixed for the lifetime of the process.
#[derive(Debug, Clone, Default)]
pub struct NodeSet {
    nodes: Arc<[Arc<Node>]>,
}

impl NodeSet {
    /// Build a roster, dropping duplicates while keeping first-seen order.
    pub fn new(nodes: impl IntoIterator<Item = Node>) -> Self {
        let mut seen = HashSet::new();
        let mut unique = Vec::new();

        for node in nodes {
            let node = Arc::new(node);
            if seen.insert(Arc::clone(&node)) {
                unique.push(node);
            } else {
                tracing::warn!(node = %node, "Duplicate node in roster ignored");
            }
        }

        Self {
            nodes: unique.into(),
        }
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: &Node) -> bool {
        self.nodes.iter().any(|n| n.as_ref() == node)
    }
}

impl FromIterator<Node> for NodeSet {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        Self::new(iter)
    }
}
