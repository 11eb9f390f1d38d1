//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals and timeouts > 0, ports non-zero)
//! - Check that the roster is usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `nodes[2].port`.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check every semantic rule and report all failures together.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.nodes.is_empty() {
        errors.push(ValidationError::new("nodes", "at least one node is required"));
    }
    for (i, node) in config.nodes.iter().enumerate() {
        if node.host.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("nodes[{i}].host"),
                "must not be empty",
            ));
        }
        if node.port == 0 {
            errors.push(ValidationError::new(
                format!("nodes[{i}].port"),
                "must be greater than zero",
            ));
        }
    }

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new(
            "listener.max_connections",
            "must be greater than zero",
        ));
    }

    let hc = &config.health_check;
    if hc.interval_ms == 0 {
        errors.push(ValidationError::new(
            "health_check.interval_ms",
            "must be greater than zero",
        ));
    }
    if hc.timeout_ms == 0 {
        errors.push(ValidationError::new(
            "health_check.timeout_ms",
            "must be greater than zero",
        ));
    }
    if !hc.path.starts_with('/') {
        errors.push(ValidationError::new("health_check.path", "must start with '/'"));
    }

    let t = &config.timeouts;
    for (field, value) in [
        ("timeouts.connect_ms", t.connect_ms),
        ("timeouts.io_ms", t.io_ms),
        ("timeouts.request_ms", t.request_ms),
        ("timeouts.client_read_ms", t.client_read_ms),
        ("timeouts.client_write_ms", t.client_write_ms),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    if config.limits.max_request_header_bytes == 0 {
        errors.push(ValidationError::new(
            "limits.max_request_header_bytes",
            "must be greater than zero",
        ));
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("{:?} is not a socket address", obs.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::NodeConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ProxyConfig::default()).is_ok());
    }

    #[test]
    fn empty_roster_rejected() {
        let config = ProxyConfig {
            nodes: Vec::new(),
            ..ProxyConfig::default()
        };
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "nodes");
    }

    #[test]
    fn reports_every_bad_field() {
        let mut config = ProxyConfig::default();
        config.nodes.push(NodeConfig {
            host: "  ".into(),
            port: 0,
        });
        config.timeouts.io_ms = 0;
        config.health_check.path = "health".into();

        let fields: Vec<_> = validate_config(&config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(
            fields,
            [
                "nodes[3].host",
                "nodes[3].port",
                "health_check.path",
                "timeouts.io_ms"
            ]
        );
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = ProxyConfig::default();
        config.observability.metrics_address = "not an address".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
