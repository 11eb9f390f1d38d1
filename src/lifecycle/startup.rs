//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the roster and health checker from configuration
//! - Run the initial health sweep
//! - Wire strategy, forwarder and engine together
//!
//! # Design Decisions
//! - Fail fast: an invalid roster is fatal
//! - Subsystems initialize in order, not concurrently
//! - The listener is bound later, by `ProxyEngine::start`

use std::sync::Arc;

use thiserror::Error;

use crate::config::ProxyConfig;
use crate::health::{HealthMonitor, NodeHealthChecker, TcpHealthChecker};
use crate::load_balancer::{create_strategy, NodeError};
use crate::proxy::{EngineConfig, ForwarderConfig, ProxyEngine, RequestForwarder};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid node roster: {0}")]
    Roster(#[from] NodeError),
}

/// Build a ready-to-start engine. Performs the first health sweep.
pub async fn build_engine(config: &ProxyConfig) -> Result<ProxyEngine, StartupError> {
    let nodes = config.node_set()?;
    let checker: Arc<dyn NodeHealthChecker> = Arc::new(TcpHealthChecker::from_config(&config.health_check));

    tracing::info!(
        nodes = nodes.len(),
        probe = ?config.health_check.probe,
        interval_ms = config.health_check.interval_ms,
        "Running initial health sweep"
    );
    let monitor = Arc::new(HealthMonitor::initialize(nodes, checker).await);

    let strategy = create_strategy(config.strategy_kind());
    let forwarder = RequestForwarder::new(ForwarderConfig::from(&config.timeouts));

    Ok(ProxyEngine::new(
        EngineConfig::from(config),
        monitor,
        strategy,
        forwarder,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;

    #[tokio::test]
    async fn invalid_roster_is_fatal() {
        let config = ProxyConfig {
            nodes: vec![NodeConfig {
                host: String::new(),
                port: 80,
            }],
            ..ProxyConfig::default()
        };
        assert!(matches!(
            build_engine(&config).await,
            Err(StartupError::Roster(NodeError::EmptyHost))
        ));
    }

    #[tokio::test]
    async fn built_engine_is_idle_until_started() {
        let mut config = ProxyConfig::default();
        config.health_check.timeout_ms = 50;

        let engine = build_engine(&config).await.unwrap();
        assert!(!engine.is_listening());
        assert_eq!(engine.monitor().roster().len(), 3);
    }
}
