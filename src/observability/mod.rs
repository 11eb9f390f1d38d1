//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Sessions, forwarder, health monitor produce:
//!     → logging.rs (structured log events, per-session span)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape, opt-in)
//! ```

pub mod logging;
pub mod metrics;
