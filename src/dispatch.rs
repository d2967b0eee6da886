//! Task dispatch
//!
//! A registry maps each task kind to a handler. Kinds without a handler
//! fall through to a logging no-op, so new kinds can be added without
//! touching existing handlers. Tasks of kind `Error` are logged and
//! dropped before the registry is consulted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::clients::{ClientRegistry, OutputKind};
use crate::collaborators::{AutomationBridge, MediaOutput};
use crate::queue::TaskQueue;
use crate::task::{Task, TaskKind};
use crate::{Error, Result};

/// Handler for one or more task kinds
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Handler name, for logging
    fn name(&self) -> &'static str;

    /// Act on one task
    async fn handle(&self, task: Task) -> Result<()>;
}

/// Maps task kinds to handlers
pub struct Dispatcher {
    handlers: HashMap<TaskKind, Arc<dyn TaskHandler>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Create a dispatcher with no handlers registered
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a kind, replacing any previous one
    ///
    /// A single handler instance may be registered for several kinds.
    pub fn register(&mut self, kind: TaskKind, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(kind, handler);
    }

    /// Dispatch one task to its handler
    ///
    /// `Error` tasks and kinds without a handler are logged and dropped;
    /// neither is a dispatch failure.
    ///
    /// # Errors
    ///
    /// Returns the handler's error, if it fails.
    pub async fn dispatch(&self, task: Task) -> Result<()> {
        if task.kind == TaskKind::Error {
            tracing::warn!(description = %task.description, "dropping error task");
            return Ok(());
        }

        match self.handlers.get(&task.kind) {
            Some(handler) => {
                tracing::debug!(
                    kind = ?task.kind,
                    handler = handler.name(),
                    "dispatching task"
                );
                handler.handle(task).await
            }
            None => {
                tracing::info!(kind = ?task.kind, "no handler registered, dropping task");
                Ok(())
            }
        }
    }

    /// Drain the queue, dispatching tasks in FIFO order until it is empty
    ///
    /// Handler failures are logged and do not stop the drain.
    pub async fn drain(&self, queue: &TaskQueue) {
        while let Ok(task) = queue.pop() {
            let kind = task.kind;
            if let Err(e) = self.dispatch(task).await {
                tracing::warn!(kind = ?kind, error = %e, "task handler failed");
            }
        }
    }
}

/// Drain the queue on a fixed cadence until cancelled
///
/// The poller wakes on an interval rather than per-enqueue; worst-case
/// dispatch latency is one interval.
pub async fn run_poller(
    queue: Arc<TaskQueue>,
    dispatcher: Arc<Dispatcher>,
    interval: Duration,
    token: CancellationToken,
) {
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = tick.tick() => dispatcher.drain(&queue).await,
        }
    }

    tracing::debug!("queue poller stopped");
}

/// Routes automation tasks to the automation bridge
pub struct AutomationHandler {
    bridge: Arc<dyn AutomationBridge>,
}

impl AutomationHandler {
    /// Create a handler backed by the given bridge
    #[must_use]
    pub fn new(bridge: Arc<dyn AutomationBridge>) -> Self {
        Self { bridge }
    }
}

#[async_trait]
impl TaskHandler for AutomationHandler {
    fn name(&self) -> &'static str {
        "automation"
    }

    async fn handle(&self, task: Task) -> Result<()> {
        let entity_id = task
            .entity_id
            .as_deref()
            .ok_or_else(|| Error::Dispatch("automation task without entity_id".to_string()))?;

        if let Some(new_state) = task.new_state.as_deref() {
            let accepted = self.bridge.send_state_change(entity_id, new_state).await?;
            tracing::info!(entity_id, new_state, accepted, "sent state change");
            return Ok(());
        }

        if let Some(service) = task.service.as_deref() {
            let domain = task.automation_domain().unwrap_or("homeassistant");
            let accepted = self.bridge.call_service(domain, service, entity_id).await?;
            tracing::info!(domain, service, entity_id, accepted, "called service");
            return Ok(());
        }

        Err(Error::Dispatch(
            "automation task carries neither new_state nor service".to_string(),
        ))
    }
}

/// Routes music tasks to the media output of the originating client
pub struct MusicHandler {
    media: Arc<dyn MediaOutput>,
    clients: Arc<ClientRegistry>,
}

impl MusicHandler {
    /// Create a handler backed by the given media collaborator and registry
    #[must_use]
    pub fn new(media: Arc<dyn MediaOutput>, clients: Arc<ClientRegistry>) -> Self {
        Self { media, clients }
    }
}

#[async_trait]
impl TaskHandler for MusicHandler {
    fn name(&self) -> &'static str {
        "music"
    }

    async fn handle(&self, task: Task) -> Result<()> {
        let origin = task
            .origin
            .as_deref()
            .ok_or_else(|| Error::Dispatch("music task without origin client".to_string()))?;
        let client = self
            .clients
            .lookup(origin)
            .ok_or_else(|| Error::Dispatch(format!("unknown client: {origin}")))?;

        if client.outputs(OutputKind::Music).is_empty() {
            return Err(Error::Dispatch(format!(
                "client {origin} has no music outputs"
            )));
        }

        let track_id = self.media.find_track(&task.entities).await?;
        let playing = self.media.play(&client, &track_id).await?;
        tracing::info!(origin, track_id, playing, "music playback requested");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Recorder {
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl TaskHandler for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn handle(&self, task: Task) -> Result<()> {
            self.seen.lock().unwrap().push(task.description);
            Ok(())
        }
    }

    #[tokio::test]
    async fn unregistered_kind_is_dropped() {
        let dispatcher = Dispatcher::new();
        let task = Task::new(TaskKind::TellJoke, "tell me a joke");
        assert!(dispatcher.dispatch(task).await.is_ok());
    }

    #[tokio::test]
    async fn error_kind_never_reaches_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(TaskKind::Error, Arc::new(Recorder { seen: seen.clone() }));

        dispatcher
            .dispatch(Task::new(TaskKind::Error, "recognition failed"))
            .await
            .unwrap();

        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn drain_dispatches_in_fifo_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(TaskKind::GetTime, Arc::new(Recorder { seen: seen.clone() }));

        let queue = TaskQueue::new();
        for i in 0..5 {
            queue.push(Task::new(TaskKind::GetTime, format!("task-{i}")));
        }

        dispatcher.drain(&queue).await;

        let order = seen.lock().unwrap().clone();
        assert_eq!(order, vec!["task-0", "task-1", "task-2", "task-3", "task-4"]);
        assert!(queue.is_empty());
    }
}
