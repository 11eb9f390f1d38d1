//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the balancer.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::health::ProbeMode;
use crate::load_balancer::{Node, NodeError, NodeSet, StrategyKind};

/// Root configuration for the load balancer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Routing strategy name (`RoundRobin`, `Random`, ...). Case-insensitive.
    pub strategy: String,

    /// Listener configuration (port, connection cap).
    pub listener: ListenerConfig,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Backend node roster.
    pub nodes: Vec<NodeConfig>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            strategy: "RoundRobin".to_string(),
            listener: ListenerConfig::default(),
            health_check: HealthCheckConfig::default(),
            timeouts: TimeoutConfig::default(),
            limits: LimitsConfig::default(),
            observability: ObservabilityConfig::default(),
            nodes: default_nodes(),
        }
    }
}

impl ProxyConfig {
    /// Build the validated roster. Fails on the first invalid node.
    pub fn node_set(&self) -> Result<NodeSet, NodeError> {
        self.nodes
            .iter()
            .map(|n| Node::new(n.host.clone(), n.port))
            .collect::<Result<Vec<_>, _>>()
            .map(NodeSet::new)
    }

    /// Parsed strategy; unknown names resolve to round robin.
    pub fn strategy_kind(&self) -> StrategyKind {
        StrategyKind::parse_or_default(&self.strategy)
    }
}

/// Built-in roster used when no usable configuration is found.
fn default_nodes() -> Vec<NodeConfig> {
    (9500..=9502)
        .map(|port| NodeConfig {
            host: "127.0.0.1".to_string(),
            port,
        })
        .collect()
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Port bound on all interfaces. 0 lets the OS pick.
    pub port: u16,

    /// Maximum concurrent sessions; extra connections are closed on accept.
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            max_connections: 10_000,
        }
    }
}

/// Backend node configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Sweep interval in milliseconds.
    pub interval_ms: u64,

    /// Per-probe timeout in milliseconds.
    pub timeout_ms: u64,

    /// Probe kind: `tcp` (connect only) or `http` (HEAD round trip).
    pub probe: ProbeMode,

    /// Path requested by `http` probes.
    pub path: String,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_ms: 30_000,
            timeout_ms: 500,
            probe: ProbeMode::Tcp,
            path: "/".to_string(),
        }
    }
}

/// Timeout configuration for network operations, in milliseconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend resolve + connect.
    pub connect_ms: u64,

    /// Each backend read or write.
    pub io_ms: u64,

    /// Whole forward hop for one session.
    pub request_ms: u64,

    /// Each read while receiving the client request.
    pub client_read_ms: u64,

    /// Relaying the full response to the client.
    pub client_write_ms: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn io(&self) -> Duration {
        Duration::from_millis(self.io_ms)
    }

    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }

    pub fn client_read(&self) -> Duration {
        Duration::from_millis(self.client_read_ms)
    }

    pub fn client_write(&self) -> Duration {
        Duration::from_millis(self.client_write_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 5_000,
            io_ms: 5_000,
            request_ms: 30_000,
            client_read_ms: 5_000,
            client_write_ms: 5_000,
        }
    }
}

/// Inbound request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest header block accepted before the session is dropped.
    pub max_request_header_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_header_bytes: 64 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_roster_is_three_local_nodes() {
        let config = ProxyConfig::default();
        let set = config.node_set().unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.nodes()[0].to_string(), "127.0.0.1:9500");
        assert_eq!(config.strategy_kind(), StrategyKind::RoundRobin);
        assert_eq!(config.listener.port, 8080);
        assert_eq!(config.health_check.interval(), Duration::from_secs(30));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            strategy = "random"

            [[nodes]]
            host = "10.0.0.1"
            port = 80
            "#,
        )
        .unwrap();

        assert_eq!(config.strategy_kind(), StrategyKind::Random);
        assert_eq!(config.nodes.len(), 1);
        assert_eq!(config.listener.port, 8080);
        assert_eq!(config.timeouts.connect_ms, 5_000);
    }

    #[test]
    fn http_probe_parses_lowercase() {
        let config: ProxyConfig =
            serde_json::from_str(r#"{ "health_check": { "probe": "http", "path": "/status" } }"#)
                .unwrap();
        assert_eq!(config.health_check.probe, ProbeMode::Http);
        assert_eq!(config.health_check.path, "/status");
        assert_eq!(config.health_check.timeout_ms, 500);
    }

    #[test]
    fn invalid_node_fails_node_set() {
        let mut config = ProxyConfig::default();
        config.nodes.push(NodeConfig {
            host: " ".into(),
            port: 1,
        });
        assert_eq!(config.node_set().unwrap_err(), NodeError::EmptyHost);
    }
}
