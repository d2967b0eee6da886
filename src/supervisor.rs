//! Service supervisor
//!
//! A polling loop that keeps a configured set of long-running services
//! alive. Each service moves through `Stopped -> Starting -> Running ->
//! (Stopped|Failed) -> Starting ...`; a crashed service is restarted on
//! the next poll tick, so time-to-recovery is bounded by the poll
//! interval. A failure inside a service body is caught at the body
//! boundary and never reaches the supervisor loop.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::Result;

/// Which side of the client/server split this process runs as
///
/// The role selects which services the supervisor is given: server mode
/// monitors the transport listener and the automation bridge (plus the
/// web listener when configured), client mode monitors wireless comm and
/// the outbound session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Inference server receiving audio from edge nodes
    Server,
    /// Edge node streaming audio to a server
    Client,
}

/// A long-running logical service managed by the supervisor
#[async_trait]
pub trait Service: Send + Sync {
    /// Service name, unique within one supervisor
    fn name(&self) -> &str;

    /// Run until the token is cancelled or the service fails
    ///
    /// # Errors
    ///
    /// Returns error on failure; the supervisor logs it and retries on
    /// the next tick.
    async fn run(&self, token: CancellationToken) -> Result<()>;
}

/// Adapter turning an async closure into a [`Service`]
pub struct FnService<F> {
    name: &'static str,
    body: F,
}

impl<F, Fut> FnService<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    /// Wrap a closure as a named service
    pub fn new(name: &'static str, body: F) -> Self {
        Self { name, body }
    }
}

#[async_trait]
impl<F, Fut> Service for FnService<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self, token: CancellationToken) -> Result<()> {
        (self.body)(token).await
    }
}

/// Snapshot of one managed service's state
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    /// Service name
    pub name: String,
    /// Whether configuration wants this service running
    pub desired: bool,
    /// Whether an instance is currently running
    pub running: bool,
    /// When the current (or last) instance was started
    pub last_started_at: Option<DateTime<Utc>>,
}

/// A launched service instance: its cancellation handle and completion
/// signal
struct ServiceInstance {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Supervisor-side record of one service
struct ManagedService {
    service: Arc<dyn Service>,
    desired: bool,
    running: Arc<AtomicBool>,
    last_started_at: Mutex<Option<DateTime<Utc>>>,
    instance: Mutex<Option<ServiceInstance>>,
}

impl ManagedService {
    /// Launch the service if it is desired and not running
    ///
    /// The `running` flag is claimed with a compare-and-swap so two ticks
    /// can never double-start a service. The spawned body resets the flag
    /// on any exit, normal or failed.
    fn ensure_running(&self, root: &CancellationToken) {
        if !self.desired {
            return;
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        *self
            .last_started_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());

        let token = root.child_token();
        let body_token = token.clone();
        let service = Arc::clone(&self.service);
        let running = Arc::clone(&self.running);

        tracing::info!(service = service.name(), "starting service");

        let handle = tokio::spawn(async move {
            match service.run(body_token).await {
                Ok(()) => tracing::info!(service = service.name(), "service stopped"),
                Err(e) => tracing::warn!(
                    service = service.name(),
                    error = %e,
                    "service failed, retrying on next tick"
                ),
            }
            running.store(false, Ordering::Release);
        });

        *self
            .instance
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(ServiceInstance { token, handle });
    }
}

/// Keeps desired services running, restarting them after failure
pub struct Supervisor {
    services: Arc<RwLock<Vec<Arc<ManagedService>>>>,
    interval: Duration,
    root: CancellationToken,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl Supervisor {
    /// Create a supervisor polling at the given interval
    ///
    /// The supervisor and every service it launches are cancelled through
    /// `root`.
    #[must_use]
    pub fn new(interval: Duration, root: CancellationToken) -> Self {
        Self {
            services: Arc::new(RwLock::new(Vec::new())),
            interval,
            root,
            monitor: Mutex::new(None),
        }
    }

    /// Register a service
    ///
    /// `desired` comes from configuration and is read-only afterwards; a
    /// service registered with `desired = false` is tracked but never
    /// started. The monitoring loop reads the shared list on every tick,
    /// so a service registered after [`Self::start_monitoring`] is picked
    /// up on the next tick.
    pub fn register(&mut self, service: Arc<dyn Service>, desired: bool) {
        self.services
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(ManagedService {
                service,
                desired,
                running: Arc::new(AtomicBool::new(false)),
                last_started_at: Mutex::new(None),
                instance: Mutex::new(None),
            }));
    }

    /// Start the monitoring loop
    ///
    /// Services are launched on the first tick. Calling this while the
    /// loop is already running is a no-op.
    pub fn start_monitoring(&self) {
        let mut monitor = self.monitor.lock().unwrap_or_else(PoisonError::into_inner);
        if monitor.is_some() {
            return;
        }

        let services = Arc::clone(&self.services);
        let root = self.root.clone();
        let interval = self.interval;

        tracing::info!(
            services = services.read().unwrap_or_else(PoisonError::into_inner).len(),
            interval = ?interval,
            "supervisor monitoring started"
        );

        *monitor = Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    () = root.cancelled() => break,
                    _ = tick.tick() => {
                        let snapshot: Vec<Arc<ManagedService>> = services
                            .read()
                            .unwrap_or_else(PoisonError::into_inner)
                            .iter()
                            .map(Arc::clone)
                            .collect();
                        for service in snapshot {
                            service.ensure_running(&root);
                        }
                    }
                }
            }
            tracing::debug!("supervisor loop exited");
        }));
    }

    /// Stop the monitoring loop and cancel all launched services
    ///
    /// Waits for the loop and every service body to wind down. Idempotent:
    /// calling it when already stopped changes nothing and does not error.
    pub async fn stop_monitoring(&self) {
        self.root.cancel();

        let monitor = self
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = monitor {
            let _ = handle.await;
        }

        let instances: Vec<ServiceInstance> = self
            .services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|s| {
                s.instance
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take()
            })
            .collect();
        for instance in instances {
            instance.token.cancel();
            let _ = instance.handle.await;
        }
    }

    /// Snapshot the state of every registered service
    #[must_use]
    pub fn status(&self) -> Vec<ServiceStatus> {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|s| ServiceStatus {
                name: s.service.name().to_string(),
                desired: s.desired,
                running: s.running.load(Ordering::Acquire),
                last_started_at: *s
                    .last_started_at
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
            })
            .collect()
    }
}
