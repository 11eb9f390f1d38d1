//! Session lifecycle tracking.
//!
//! # Responsibilities
//! - Count sessions that are still running
//! - Let shutdown wait (bounded) until every session has finished
//! - Publish the active-session gauge

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::observability::metrics;

/// Tracks active sessions for graceful shutdown.
///
/// Uses a watch channel so waiters wake on the last guard drop instead of polling.
#[derive(Debug, Clone)]
pub struct SessionTracker {
    active: Arc<watch::Sender<usize>>,
}

impl SessionTracker {
    /// Create a new session tracker.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            active: Arc::new(tx),
        }
    }

    /// Record a new active session. Returns a guard that decrements on drop.
    pub fn track(&self) -> SessionGuard {
        let mut now = 0;
        self.active.send_modify(|count| {
            *count += 1;
            now = *count;
        });
        metrics::record_active_sessions(now);

        SessionGuard {
            active: Arc::clone(&self.active),
        }
    }

    /// Get current active session count.
    pub fn active_count(&self) -> usize {
        *self.active.borrow()
    }

    /// Wait until no session is active. Returns `false` if `limit` elapsed first.
    pub async fn wait_idle(&self, limit: Duration) -> bool {
        let mut rx = self.active.subscribe();
        let idle = tokio::time::timeout(limit, rx.wait_for(|count| *count == 0))
            .await
            .is_ok();
        idle
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that tracks a session's lifetime.
/// Decrements active count when dropped.
#[derive(Debug)]
pub struct SessionGuard {
    active: Arc<watch::Sender<usize>>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let mut now = 0;
        self.active.send_modify(|count| {
            *count = count.saturating_sub(1);
            now = *count;
        });
        metrics::record_active_sessions(now);
    }
}
