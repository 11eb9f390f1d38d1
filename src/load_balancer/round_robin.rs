//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{node::Node, RoutingStrategy};

/// Round-robin selector.
///
/// The cursor survives snapshot resizes; the modulo is always taken against
/// the size of the slice passed to the current call.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoutingStrategy for RoundRobin {
    fn next_node(&self, nodes: &[Arc<Node>]) -> Option<Arc<Node>> {
        if nodes.is_empty() {
            return None;
        }

        // fetch_add wraps on overflow, so the index stays in bounds.
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % nodes.len();
        Some(Arc::clone(&nodes[index]))
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}
