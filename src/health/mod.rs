//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! HealthMonitor::initialize
//!     → one synchronous sweep (first snapshot)
//! start_monitoring(interval)
//!     → periodic timer task
//!     → checker.rs probes every roster node (concurrently)
//!     → healthy subset collected in roster order
//!     → ArcSwap store (readers see old or new list, never a partial one)
//! ```
//!
//! # Design Decisions
//! - Probe failures never escape the checker; they only mark a node down
//! - Snapshot is replaced, never mutated in place
//! - Health is up/down per sweep, no thresholds

pub mod checker;
pub mod monitor;

pub use checker::{NodeHealthChecker, ProbeMode, TcpHealthChecker};
pub use monitor::{HealthError, HealthMonitor, MonitorState, Snapshot};
