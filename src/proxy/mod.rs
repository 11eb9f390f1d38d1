//! Client-facing proxy subsystem.
//!
//! # Data Flow
//! ```text
//! engine.rs accept loop
//!     → session.rs (read header block, route, forward, relay)
//!     → forwarder.rs (one backend hop, full response buffered)
//!     → bytes written back to the client, connection closed
//! ```
//!
//! # Design Decisions
//! - One task per session; the accept loop never waits on one
//! - Failures close the client connection without a response
//! - Exactly one backend attempt per session

pub mod engine;
pub mod forwarder;
pub mod session;

pub use engine::{EngineConfig, EngineError, ProxyEngine};
pub use forwarder::{ForwardError, ForwarderConfig, RequestForwarder};
pub use session::{Session, SessionContext, SessionError, SessionSettings, SessionState};
