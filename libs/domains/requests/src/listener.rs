//! Listener lifecycle: at most one pull fetcher per `(subject, id_field)`.

use async_trait::async_trait;
use core_config::gateway::ConsumerTuning;
use messaging::nats::{metrics::set_active_connections, SubjectConsumer};
use messaging::{MessageHandler, PullFetcher};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::RequestResult;
use crate::models::ListenerKey;

/// Lifecycle of one listener worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Creating,
    Running,
    Stopping,
    Stopped,
}

struct ListenerHandle {
    running: watch::Sender<bool>,
    worker: JoinHandle<()>,
    state: ListenerState,
}

/// Registry operations the orchestrator and recovery depend on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ListenerControl: Send + Sync {
    /// Idempotently activate the listener for a key. Two concurrent
    /// calls with the same key start exactly one worker.
    async fn ensure_listener_active(&self, subject: &str, id_field: &str) -> RequestResult<()>;

    /// Stop every listener: signal, wait up to the shutdown grace, then
    /// abort stragglers.
    async fn stop_all(&self);

    /// Keys with an active worker.
    async fn active_keys(&self) -> Vec<ListenerKey>;
}

/// Owns the set of active subject listeners.
pub struct ListenerManager {
    jetstream: Arc<async_nats::jetstream::Context>,
    tuning: ConsumerTuning,
    shutdown_grace: Duration,
    handler: Arc<dyn MessageHandler>,
    registry: Mutex<HashMap<ListenerKey, ListenerHandle>>,
}

impl ListenerManager {
    pub fn new(
        jetstream: Arc<async_nats::jetstream::Context>,
        tuning: ConsumerTuning,
        shutdown_grace: Duration,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            jetstream,
            tuning,
            shutdown_grace,
            handler,
            registry: Mutex::new(HashMap::new()),
        }
    }

    /// State of every registered listener. Only RUNNING listeners emit
    /// messages; entries disappear from the registry once stopped.
    pub async fn states(&self) -> HashMap<ListenerKey, ListenerState> {
        self.registry
            .lock()
            .await
            .iter()
            .map(|(key, handle)| (key.clone(), handle.state))
            .collect()
    }
}

#[async_trait]
impl ListenerControl for ListenerManager {
    async fn ensure_listener_active(&self, subject: &str, id_field: &str) -> RequestResult<()> {
        let key = ListenerKey::new(subject, id_field);

        // The check-and-start is serialized under the registry mutex
        let mut registry = self.registry.lock().await;

        if registry.contains_key(&key) {
            debug!(key = %key, "Listener already active");
            return Ok(());
        }

        info!(key = %key, state = ?ListenerState::Creating, "Activating listener");

        let consumer = SubjectConsumer::new(self.jetstream.clone(), subject);
        consumer.init().await?;

        let (running_tx, running_rx) = watch::channel(true);
        let fetcher = PullFetcher::new(
            key.to_string(),
            consumer,
            id_field,
            self.handler.clone(),
            self.tuning.clone(),
            running_rx,
        );
        let worker = tokio::spawn(fetcher.run());

        registry.insert(
            key.clone(),
            ListenerHandle {
                running: running_tx,
                worker,
                state: ListenerState::Running,
            },
        );
        set_active_connections(registry.len());

        info!(key = %key, state = ?ListenerState::Running, "Listener active");
        Ok(())
    }

    async fn stop_all(&self) {
        let handles: Vec<(ListenerKey, ListenerHandle)> = {
            let mut registry = self.registry.lock().await;
            registry.drain().collect()
        };

        if handles.is_empty() {
            return;
        }

        info!(count = handles.len(), "Stopping all listeners");

        // Signal first so every worker can wind down concurrently
        let mut stopping = Vec::with_capacity(handles.len());
        for (key, mut handle) in handles {
            handle.state = ListenerState::Stopping;
            let _ = handle.running.send(false);
            stopping.push((key, handle));
        }

        // One shared grace budget for the lot
        let deadline = Instant::now() + self.shutdown_grace;
        for (key, mut handle) in stopping {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, &mut handle.worker).await {
                Ok(_) => {
                    handle.state = ListenerState::Stopped;
                    debug!(key = %key, "Listener stopped cleanly");
                }
                Err(_) => {
                    warn!(key = %key, "Listener exceeded shutdown grace, aborting");
                    handle.worker.abort();
                    handle.state = ListenerState::Stopped;
                }
            }
        }

        set_active_connections(0);
        info!("All listeners stopped");
    }

    async fn active_keys(&self) -> Vec<ListenerKey> {
        self.registry.lock().await.keys().cloned().collect()
    }
}
