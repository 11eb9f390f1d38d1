//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Client read, backend resolve/connect/send/receive:
//!     → timeouts.rs (every step carries its own deadline)
//!     → elapsed deadline surfaces as io::ErrorKind::TimedOut
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No retries: a failed hop ends the session

pub mod timeouts;
