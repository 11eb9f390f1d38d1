//! TCP Load Balancer
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────┐
//!                          │                 TCP BALANCER                  │
//!                          │                                               │
//!     Client connection    │  ┌─────────┐   ┌─────────┐   ┌────────────┐  │
//!     ─────────────────────┼─▶│   net   │──▶│ session │──▶│  routing   │  │
//!                          │  │listener │   │ (proxy) │   │  strategy  │  │
//!                          │  └─────────┘   └────┬────┘   └─────┬──────┘  │
//!                          │                     │              │          │
//!                          │                     │   snapshot   ▼          │
//!                          │                     │   ┌────────────────┐    │
//!                          │                     │   │ health monitor │    │
//!                          │                     │   └────────────────┘    │
//!                          │                     ▼                          │
//!     Response bytes       │              ┌────────────┐                    │
//!     ◀────────────────────┼──────────────│ forwarder  │◀───────────────────┼──── Backend
//!                          │              └────────────┘                    │     Node
//!                          └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use tcp_balancer::config::load_or_default;
use tcp_balancer::lifecycle::{build_engine, wait_for_signal};
use tcp_balancer::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "tcp-balancer", version)]
#[command(about = "Health-aware TCP load balancer", long_about = None)]
struct Cli {
    /// Configuration file (.toml or .json). Built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listening port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the routing strategy (RoundRobin, Random).
    #[arg(long)]
    strategy: Option<String>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Seconds to wait for in-flight sessions on shutdown.
    #[arg(long, default_value_t = 30)]
    drain_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = logging::with_bootstrap_logging(|| load_or_default(cli.config.as_deref()));
    if let Some(port) = cli.port {
        config.listener.port = port;
    }
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }

    logging::init_logging(&config.observability.log_level);
    tracing::info!("tcp-balancer v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        port = config.listener.port,
        strategy = %config.strategy,
        nodes = config.nodes.len(),
        health_interval_ms = config.health_check.interval_ms,
        max_connections = config.listener.max_connections,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let engine = build_engine(&config).await?;
    let addr = engine.start().await?;
    tracing::info!(address = %addr, "Listening for connections");

    wait_for_signal().await;

    engine.stop().await;
    if !engine.drain(Duration::from_secs(cli.drain_secs)).await {
        tracing::warn!(
            in_flight = engine.active_sessions(),
            "Drain deadline reached, exiting with sessions still open"
        );
    }
    engine.monitor().dispose();

    tracing::info!("Shutdown complete");
    Ok(())
}
