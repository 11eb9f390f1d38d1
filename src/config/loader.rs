//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("unsupported config format: {0:?} (expected .toml or .json)")]
    UnsupportedFormat(String),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML or JSON file.
///
/// The format follows the file extension; files without one are read as TOML.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;

    let config: ProxyConfig = match path.extension().and_then(|e| e.to_str()) {
        None | Some("toml") => {
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?
        }
        Some("json") => {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?
        }
        Some(other) => return Err(ConfigError::UnsupportedFormat(other.to_string())),
    };

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load `path` if given, falling back to the built-in defaults when it is
/// absent or unusable. Never fails.
pub fn load_or_default(path: Option<&Path>) -> ProxyConfig {
    let Some(path) = path else {
        tracing::info!("No configuration file given, using built-in defaults");
        return ProxyConfig::default();
    };

    match load_config(path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), nodes = config.nodes.len(), "Configuration loaded");
            config
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to load configuration, using built-in defaults");
            ProxyConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}", uuid::Uuid::new_v4(), name));
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_toml_by_extension() {
        let path = write_temp(
            "balancer.toml",
            r#"
            strategy = "Random"

            [listener]
            port = 9000

            [[nodes]]
            host = "backend-1"
            port = 8001
            "#,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.listener.port, 9000);
        assert_eq!(config.nodes[0].host, "backend-1");
        fs::remove_file(path).ok();
    }

    #[test]
    fn loads_json_by_extension() {
        let path = write_temp(
            "balancer.json",
            r#"{ "nodes": [ { "host": "10.0.0.5", "port": 80 } ] }"#,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.nodes.len(), 1);
        assert_eq!(config.strategy, "RoundRobin");
        fs::remove_file(path).ok();
    }

    #[test]
    fn rejects_unknown_extension() {
        let path = write_temp("balancer.yaml", "strategy: Random");
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::UnsupportedFormat(ext)) if ext == "yaml"
        ));
        fs::remove_file(path).ok();
    }

    #[test]
    fn validation_errors_are_collected() {
        let path = write_temp(
            "invalid.toml",
            r#"
            [health_check]
            interval_ms = 0

            [[nodes]]
            host = ""
            port = 0
            "#,
        );

        match load_config(&path) {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation errors, got {other:?}"),
        }
        fs::remove_file(path).ok();
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_or_default(Some(Path::new("/nonexistent/balancer.toml")));
        assert_eq!(config.nodes.len(), 3);
        assert_eq!(config.listener.port, 8080);
    }
}
