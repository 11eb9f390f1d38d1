//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Session reaches Routed
//!     → health monitor snapshot (healthy nodes only)
//!     → RoutingStrategy::next_node:
//!         - round_robin.rs (rotate through the snapshot)
//!         - random.rs (uniform pick)
//!     → Arc<Node> bound into the session
//! ```
//!
//! # Design Decisions
//! - Strategies work on positions in the snapshot, never on per-node state
//! - Each strategy instance owns its cursor or RNG
//! - Unknown strategy names fall back to round robin

pub mod node;
pub mod random;
pub mod round_robin;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use node::{Node, NodeConnectionGuard, NodeError, NodeSet};
pub use random::RandomStrategy;
pub use round_robin::RoundRobin;

/// Picks one node from a snapshot of available nodes.
pub trait RoutingStrategy: Send + Sync + fmt::Debug {
    /// Returns `None` only when `nodes` is empty.
    fn next_node(&self, nodes: &[Arc<Node>]) -> Option<Arc<Node>>;

    fn name(&self) -> &'static str;
}

/// Strategy names accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    #[default]
    RoundRobin,
    Random,
    /// Declared but not implemented; resolves to round robin.
    LeastConnections,
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "roundrobin" | "round_robin" | "round-robin" => Ok(Self::RoundRobin),
            "random" => Ok(Self::Random),
            "leastconnections" | "least_connections" | "least-connections" => {
                Ok(Self::LeastConnections)
            }
            other => Err(format!("unknown routing strategy '{}'", other)),
        }
    }
}

impl StrategyKind {
    /// Parse a configured name, falling back to round robin with a warning.
    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or_else(|err| {
            tracing::warn!(strategy = %name, error = %err, "Falling back to RoundRobin");
            Self::RoundRobin
        })
    }
}

/// Build the strategy instance for `kind`.
pub fn create_strategy(kind: StrategyKind) -> Arc<dyn RoutingStrategy> {
    match kind {
        StrategyKind::RoundRobin => Arc::new(RoundRobin::new()),
        StrategyKind::Random => Arc::new(RandomStrategy::new()),
        other => {
            tracing::warn!(
                strategy = ?other,
                "Unsupported routing strategy, falling back to round robin"
            );
            Arc::new(RoundRobin::new())
        }
    }
}
