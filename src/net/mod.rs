//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (session tracking for drain)
//!     → Hand off to a proxy session task
//! ```
//!
//! # Design Decisions
//! - Over-limit connections are closed, never queued
//! - Each session tracked for graceful shutdown

pub mod connection;
pub mod listener;

pub use connection::{SessionGuard, SessionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
