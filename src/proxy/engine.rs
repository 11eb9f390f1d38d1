//! The balancer's front door.
//!
//! # Responsibilities
//! - Start health monitoring and bind the listener
//! - Accept connections and hand each to its own session task
//! - Stop accepting on request while in-flight sessions finish
//!
//! # Design Decisions
//! - The accept loop never awaits session work
//! - Stop closes the listener before returning
//! - Accept errors are logged and retried after a short pause

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::{ListenerConfig, ProxyConfig};
use crate::health::{HealthError, HealthMonitor};
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::load_balancer::RoutingStrategy;
use crate::net::{Listener, ListenerError, SessionTracker};
use crate::proxy::forwarder::RequestForwarder;
use crate::proxy::session::{Session, SessionContext, SessionSettings};

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Errors from [`ProxyEngine::start`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Bind(#[from] ListenerError),

    #[error("health monitor refused to start: {0}")]
    Health(#[from] HealthError),
}

/// Engine-level settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub listener: ListenerConfig,
    pub health_check_interval: Duration,
    pub session: SessionSettings,
}

impl From<&ProxyConfig> for EngineConfig {
    fn from(config: &ProxyConfig) -> Self {
        Self {
            listener: config.listener.clone(),
            health_check_interval: config.health_check.interval(),
            session: SessionSettings::from(config),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&ProxyConfig::default())
    }
}

struct Running {
    shutdown: Shutdown,
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

/// Accepts client connections and runs one session per connection.
pub struct ProxyEngine {
    config: EngineConfig,
    context: SessionContext,
    tracker: SessionTracker,
    starting: AtomicBool,
    running: Mutex<Option<Running>>,
}

impl ProxyEngine {
    pub fn new(
        config: EngineConfig,
        monitor: Arc<HealthMonitor>,
        strategy: Arc<dyn RoutingStrategy>,
        forwarder: RequestForwarder,
    ) -> Self {
        let context = SessionContext {
            monitor,
            strategy,
            forwarder: Arc::new(forwarder),
            settings: config.session,
        };

        Self {
            config,
            context,
            tracker: SessionTracker::new(),
            starting: AtomicBool::new(false),
            running: Mutex::new(None),
        }
    }

    /// Start monitoring, bind the listener and begin accepting.
    /// Returns the bound address.
    pub async fn start(&self) -> Result<SocketAddr, EngineError> {
        if self
            .starting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(EngineError::AlreadyRunning);
        }

        match self.bind_and_spawn().await {
            Ok(addr) => Ok(addr),
            Err(e) => {
                self.starting.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    async fn bind_and_spawn(&self) -> Result<SocketAddr, EngineError> {
        let monitor = &self.context.monitor;
        monitor.start_monitoring(self.config.health_check_interval)?;

        let listener = match Listener::bind(&self.config.listener).await {
            Ok(listener) => listener,
            Err(e) => {
                let _ = monitor.stop_monitoring();
                return Err(e.into());
            }
        };
        let local_addr = listener.local_addr().map_err(|source| {
            let _ = monitor.stop_monitoring();
            ListenerError::Bind {
                port: self.config.listener.port,
                source,
            }
        })?;

        let shutdown = Shutdown::new();
        let accept_task = tokio::spawn(accept_loop(
            listener,
            shutdown.subscribe(),
            self.context.clone(),
            self.tracker.clone(),
        ));

        *self.lock() = Some(Running {
            shutdown,
            local_addr,
            accept_task,
        });

        tracing::info!(
            address = %local_addr,
            strategy = self.context.strategy.name(),
            nodes = monitor.roster().len(),
            "Proxy engine started"
        );
        Ok(local_addr)
    }

    /// Stop monitoring and accepting. Sessions already running finish on
    /// their own. Calling stop on a stopped engine does nothing.
    pub async fn stop(&self) {
        let Some(running) = self.lock().take() else {
            return;
        };

        running.shutdown.trigger();
        if let Err(e) = running.accept_task.await {
            tracing::error!(error = %e, "Accept loop ended abnormally");
        }
        if let Err(e) = self.context.monitor.stop_monitoring() {
            tracing::debug!(error = %e, "Health monitor already stopped");
        }

        self.starting.store(false, Ordering::Release);
        tracing::info!(
            address = %running.local_addr,
            in_flight = self.tracker.active_count(),
            "Proxy engine stopped"
        );
    }

    /// Wait for in-flight sessions to finish. `false` if `limit` elapsed first.
    pub async fn drain(&self, limit: Duration) -> bool {
        self.tracker.wait_idle(limit).await
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock().as_ref().map(|r| r.local_addr)
    }

    pub fn is_listening(&self) -> bool {
        self.lock().is_some()
    }

    pub fn active_sessions(&self) -> usize {
        self.tracker.active_count()
    }

    pub fn monitor(&self) -> &Arc<HealthMonitor> {
        &self.context.monitor
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for ProxyEngine {
    fn drop(&mut self) {
        if let Some(running) = self.lock().as_ref() {
            running.shutdown.trigger();
        }
    }
}

impl std::fmt::Debug for ProxyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyEngine")
            .field("local_addr", &self.local_addr())
            .field("strategy", &self.context.strategy.name())
            .field("active_sessions", &self.active_sessions())
            .finish()
    }
}

async fn accept_loop(
    listener: Listener,
    mut shutdown: ShutdownSignal,
    context: SessionContext,
    tracker: SessionTracker,
) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown.recv() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer, permit)) => {
                let guard = tracker.track();
                let context = context.clone();
                let session = Session::new(stream, peer);
                let span = tracing::info_span!("session", id = %session.id(), peer = %peer);

                tokio::spawn(
                    async move {
                        session.run(&context).await;
                        drop(guard);
                        drop(permit);
                    }
                    .instrument(span),
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "Accept error");
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }

    tracing::info!("Accept loop received shutdown signal, listener closed");
}
