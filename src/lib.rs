//! TCP load balancer library.
//!
//! Accepts client connections, picks a healthy backend node per connection
//! and relays that node's response back verbatim.

// Core subsystems
pub mod config;
pub mod net;
pub mod proxy;

// Traffic management
pub mod health;
pub mod load_balancer;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::ProxyConfig;
pub use lifecycle::Shutdown;
pub use proxy::ProxyEngine;
