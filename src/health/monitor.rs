//! Periodic health sweeps and the available-nodes snapshot.
//!
//! # Responsibilities
//! - Own the configured roster and the health checker
//! - Sweep every node on a timer
//! - Publish the healthy subset as an immutable snapshot

use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use futures_util::future::join_all;
use thiserror::Error;
use tokio::time::{self, MissedTickBehavior};

use crate::health::checker::NodeHealthChecker;
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::load_balancer::{Node, NodeSet};
use crate::observability::metrics;

/// The healthy subset of the roster, in roster order.
pub type Snapshot = Arc<Vec<Arc<Node>>>;

/// Errors from monitor lifecycle calls.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HealthError {
    #[error("health check interval must be greater than zero")]
    InvalidInterval,

    #[error("health monitor has been disposed")]
    Disposed,
}

/// Observable lifecycle of a [`HealthMonitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Initial sweep done, no timer running.
    Idle,
    /// Timer running.
    Monitoring,
    /// Disposed. Terminal.
    Stopped,
}

enum Lifecycle {
    Idle,
    Monitoring(Shutdown),
    Stopped,
}

impl Lifecycle {
    fn state(&self) -> MonitorState {
        match self {
            Lifecycle::Idle => MonitorState::Idle,
            Lifecycle::Monitoring(_) => MonitorState::Monitoring,
            Lifecycle::Stopped => MonitorState::Stopped,
        }
    }
}

/// Everything a sweep task needs, shared with the monitor.
struct Sweeper {
    roster: NodeSet,
    checker: Arc<dyn NodeHealthChecker>,
    available: ArcSwap<Vec<Arc<Node>>>,
    /// One sweep at a time, so an older result never replaces a newer one.
    in_progress: tokio::sync::Mutex<()>,
}

impl Sweeper {
    /// Probe the whole roster concurrently and swap in a fresh snapshot.
    async fn sweep(&self) {
        let _sweeping = self.in_progress.lock().await;
        let nodes = self.roster.nodes();
        let results = join_all(nodes.iter().map(|node| self.checker.is_healthy(node))).await;

        let healthy: Vec<Arc<Node>> = nodes
            .iter()
            .zip(&results)
            .filter(|(_, up)| **up)
            .map(|(node, _)| Arc::clone(node))
            .collect();
        let healthy_count = healthy.len();

        let previous = self.available.swap(Arc::new(healthy));

        for (node, up) in nodes.iter().zip(&results) {
            let was_up = previous.iter().any(|n| n == node);
            match (was_up, *up) {
                (false, true) => tracing::info!(node = %node, "Node is now available"),
                (true, false) => tracing::warn!(node = %node, "Node is now unavailable"),
                _ => {}
            }
            metrics::record_node_health(&node.to_string(), *up);
        }
        metrics::record_available_nodes(healthy_count);

        tracing::debug!(
            healthy = healthy_count,
            total = nodes.len(),
            "Health sweep complete"
        );
    }

    async fn run(self: Arc<Self>, interval: Duration, mut shutdown: ShutdownSignal) {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.recv() => break,
            }
            tokio::select! {
                _ = self.sweep() => {}
                _ = shutdown.recv() => break,
            }
        }

        tracing::info!("Health monitor received shutdown signal, exiting loop");
    }
}

/// Maintains the live view of which nodes are reachable.
pub struct HealthMonitor {
    sweeper: Arc<Sweeper>,
    lifecycle: Mutex<Lifecycle>,
}

impl HealthMonitor {
    /// Record the roster and run one full sweep before returning, so the
    /// first snapshot exists before monitoring starts.
    pub async fn initialize(nodes: NodeSet, checker: Arc<dyn NodeHealthChecker>) -> Self {
        let sweeper = Arc::new(Sweeper {
            roster: nodes,
            checker,
            available: ArcSwap::from_pointee(Vec::new()),
            in_progress: tokio::sync::Mutex::new(()),
        });
        sweeper.sweep().await;

        tracing::info!(
            available = sweeper.available.load().len(),
            total = sweeper.roster.len(),
            "Health monitor initialized"
        );

        Self {
            sweeper,
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    /// Start sweeping every `interval`. The first sweep runs immediately.
    /// Restarting while already monitoring replaces the running timer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_monitoring(&self, interval: Duration) -> Result<(), HealthError> {
        if interval.is_zero() {
            return Err(HealthError::InvalidInterval);
        }

        let mut lifecycle = self.lock();
        match &*lifecycle {
            Lifecycle::Stopped => return Err(HealthError::Disposed),
            Lifecycle::Monitoring(previous) => previous.trigger(),
            Lifecycle::Idle => {}
        }

        let shutdown = Shutdown::new();
        let receiver = shutdown.subscribe();
        tokio::spawn(Arc::clone(&self.sweeper).run(interval, receiver));
        *lifecycle = Lifecycle::Monitoring(shutdown);

        tracing::info!(interval = ?interval, nodes = self.sweeper.roster.len(), "Health monitor starting");
        Ok(())
    }

    /// Cancel the sweep timer. Safe to call when not monitoring.
    pub fn stop_monitoring(&self) -> Result<(), HealthError> {
        let mut lifecycle = self.lock();
        match &*lifecycle {
            Lifecycle::Stopped => Err(HealthError::Disposed),
            Lifecycle::Idle => Ok(()),
            Lifecycle::Monitoring(shutdown) => {
                shutdown.trigger();
                *lifecycle = Lifecycle::Idle;
                Ok(())
            }
        }
    }

    /// Stop monitoring and refuse further start/stop calls.
    /// The last snapshot stays readable.
    pub fn dispose(&self) {
        let mut lifecycle = self.lock();
        if let Lifecycle::Monitoring(shutdown) = &*lifecycle {
            shutdown.trigger();
        }
        *lifecycle = Lifecycle::Stopped;
    }

    /// Current snapshot of healthy nodes. Never blocks a running sweep.
    pub fn available_nodes(&self) -> Snapshot {
        self.sweeper.available.load_full()
    }

    /// Run one sweep now, outside the timer.
    pub async fn sweep(&self) {
        self.sweeper.sweep().await;
    }

    /// The full configured roster.
    pub fn roster(&self) -> &NodeSet {
        &self.sweeper.roster
    }

    pub fn state(&self) -> MonitorState {
        self.lock().state()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        if let Lifecycle::Monitoring(shutdown) = &*self.lock() {
            shutdown.trigger();
        }
    }
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("roster", &self.sweeper.roster.len())
            .field("available", &self.sweeper.available.load().len())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Checker whose answers can be flipped between sweeps.
    #[derive(Default)]
    struct ScriptedChecker {
        answers: Mutex<HashMap<String, bool>>,
    }

    impl ScriptedChecker {
        fn set(&self, host: &str, healthy: bool) {
            self.answers.lock().unwrap().insert(host.to_string(), healthy);
        }
    }

    #[async_trait]
    impl NodeHealthChecker for ScriptedChecker {
        async fn is_healthy(&self, node: &Node) -> bool {
            self.answers
                .lock()
                .unwrap()
                .get(node.host())
                .copied()
                .unwrap_or(false)
        }
    }

    fn roster() -> NodeSet {
        NodeSet::new(vec![
            Node::new("A", 1).unwrap(),
            Node::new("B", 2).unwrap(),
            Node::new("C", 3).unwrap(),
        ])
    }

    fn hosts(snapshot: &Snapshot) -> Vec<String> {
        snapshot.iter().map(|n| n.host().to_string()).collect()
    }

    #[tokio::test]
    async fn initialize_publishes_first_snapshot() {
        let checker = Arc::new(ScriptedChecker::default());
        checker.set("A", true);
        checker.set("B", false);
        checker.set("C", true);

        let monitor = HealthMonitor::initialize(roster(), checker).await;

        assert_eq!(hosts(&monitor.available_nodes()), ["A", "C"]);
        assert_eq!(monitor.state(), MonitorState::Idle);
    }

    #[tokio::test]
    async fn manual_sweep_replaces_snapshot_wholesale() {
        let checker = Arc::new(ScriptedChecker::default());
        checker.set("A", true);
        checker.set("C", true);
        let monitor = HealthMonitor::initialize(roster(), checker.clone()).await;
        let before = monitor.available_nodes();

        checker.set("A", false);
        checker.set("B", true);
        monitor.sweep().await;

        assert_eq!(hosts(&monitor.available_nodes()), ["B", "C"]);
        // readers holding the old snapshot keep a complete, unchanged list
        assert_eq!(hosts(&before), ["A", "C"]);
    }

    /// Counts how many health checks run at once.
    #[derive(Default)]
    struct OverlapChecker {
        running: std::sync::atomic::AtomicUsize,
        peak: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl NodeHealthChecker for OverlapChecker {
        async fn is_healthy(&self, _node: &Node) -> bool {
            use std::sync::atomic::Ordering;
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            true
        }
    }

    #[tokio::test]
    async fn overlapping_sweeps_run_one_at_a_time() {
        let checker = Arc::new(OverlapChecker::default());
        let single = NodeSet::new(vec![Node::new("A", 1).unwrap()]);
        let monitor = HealthMonitor::initialize(single, checker.clone()).await;

        tokio::join!(monitor.sweep(), monitor.sweep(), monitor.sweep());

        assert_eq!(checker.peak.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(hosts(&monitor.available_nodes()), ["A"]);
    }

    #[tokio::test]
    async fn zero_interval_rejected() {
        let monitor = HealthMonitor::initialize(roster(), Arc::new(ScriptedChecker::default())).await;
        assert_eq!(
            monitor.start_monitoring(Duration::ZERO),
            Err(HealthError::InvalidInterval)
        );
        assert_eq!(monitor.state(), MonitorState::Idle);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let monitor = HealthMonitor::initialize(roster(), Arc::new(ScriptedChecker::default())).await;
        assert!(monitor.stop_monitoring().is_ok());

        monitor.start_monitoring(Duration::from_secs(60)).unwrap();
        assert_eq!(monitor.state(), MonitorState::Monitoring);
        assert!(monitor.stop_monitoring().is_ok());
        assert!(monitor.stop_monitoring().is_ok());
        assert_eq!(monitor.state(), MonitorState::Idle);
    }

    #[tokio::test]
    async fn disposed_monitor_refuses_lifecycle_calls() {
        let checker = Arc::new(ScriptedChecker::default());
        checker.set("B", true);
        let monitor = HealthMonitor::initialize(roster(), checker).await;
        monitor.start_monitoring(Duration::from_secs(60)).unwrap();

        monitor.dispose();

        assert_eq!(monitor.state(), MonitorState::Stopped);
        assert_eq!(
            monitor.start_monitoring(Duration::from_secs(1)),
            Err(HealthError::Disposed)
        );
        assert_eq!(monitor.stop_monitoring(), Err(HealthError::Disposed));
        assert_eq!(hosts(&monitor.available_nodes()), ["B"]);
    }
}
