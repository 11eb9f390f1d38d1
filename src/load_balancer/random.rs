//! Uniform random load balancing strategy.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::load_balancer::{node::Node, RoutingStrategy};

/// Random selector.
/// Owns its RNG; concurrent callers serialize on the mutex.
#[derive(Debug)]
pub struct RandomStrategy {
    rng: Mutex<StdRng>,
}

impl RandomStrategy {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic selector for tests and reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingStrategy for RandomStrategy {
    fn next_node(&self, nodes: &[Arc<Node>]) -> Option<Arc<Node>> {
        if nodes.is_empty() {
            return None;
        }

        let index = {
            // A poisoned lock still holds a usable RNG.
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            rng.gen_range(0..nodes.len())
        };
        Some(Arc::clone(&nodes[index]))
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes() -> Vec<Arc<Node>> {
        ["A", "B", "C"]
            .iter()
            .enumerate()
            .map(|(i, h)| Arc::new(Node::new(*h, i as u16 + 1).unwrap()))
            .collect()
    }

    #[test]
    fn empty_snapshot_yields_none() {
        assert!(RandomStrategy::new().next_node(&[]).is_none());
    }

    #[test]
    fn same_seed_same_sequence() {
        let backends = nodes();
        let a = RandomStrategy::with_seed(42);
        let b = RandomStrategy::with_seed(42);

        for _ in 0..32 {
            assert_eq!(a.next_node(&backends), b.next_node(&backends));
        }
    }

    #[test]
    fn picks_come_from_snapshot_and_cover_it() {
        let backends = nodes();
        let lb = RandomStrategy::with_seed(7);
        let mut seen = [false; 3];

        for _ in 0..300 {
            let node = lb.next_node(&backends).unwrap();
            let pos = backends.iter().position(|n| n == &node).unwrap();
            seen[pos] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn concurrent_callers_never_panic() {
        let lb = Arc::new(RandomStrategy::new());
        let backends = Arc::new(nodes());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lb = Arc::clone(&lb);
                let backends = Arc::clone(&backends);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        assert!(lb.next_node(&backends).is_some());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
