//! Fire-and-forget observer fan-out.
//!
//! Observers register and deregister through a control channel; events
//! flow through a bounded queue into a worker pool. Nothing here may
//! back-pressure the correlation path: a full queue or an exhausted pool
//! drops the notification and bumps a counter.

use crate::metrics::RequestMetrics;
use crate::models::RequestStatus;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default size of the notification worker pool.
pub const DEFAULT_POOL_SIZE: usize = 3;

const EVENT_QUEUE_CAPACITY: usize = 256;

/// Lifecycle events of a gateway request.
#[derive(Debug, Clone)]
pub enum RequestEvent {
    /// A request was persisted and published
    Registered { request_id: String, subject: String },
    /// A correlated response transitioned the request
    Completed {
        request_id: String,
        status: RequestStatus,
    },
    /// The sweeper marked the request overdue
    TimedOut { request_id: String },
    /// An inbound message matched no pending request
    Unmatched {
        extracted_id: String,
        subject: String,
    },
}

/// Receives request lifecycle events.
///
/// Notifications are asynchronous and lossy by design; observers must
/// tolerate missing events and must never assume ordering across
/// requests.
#[async_trait]
pub trait RequestObserver: Send + Sync {
    async fn notify(&self, event: &RequestEvent);

    fn name(&self) -> &'static str;
}

/// An observer that logs every event.
#[derive(Debug, Default)]
pub struct LoggingObserver;

#[async_trait]
impl RequestObserver for LoggingObserver {
    async fn notify(&self, event: &RequestEvent) {
        match event {
            RequestEvent::Registered {
                request_id,
                subject,
            } => info!(request_id, subject, "Request registered"),
            RequestEvent::Completed { request_id, status } => {
                info!(request_id, status = %status, "Request completed")
            }
            RequestEvent::TimedOut { request_id } => info!(request_id, "Request timed out"),
            RequestEvent::Unmatched {
                extracted_id,
                subject,
            } => info!(extracted_id, subject, "Unmatched response"),
        }
    }

    fn name(&self) -> &'static str {
        "logging_observer"
    }
}

enum ControlMsg {
    Register {
        id: u64,
        observer: Arc<dyn RequestObserver>,
    },
    Deregister {
        id: u64,
    },
}

/// Emits events into the fan-out without blocking.
#[derive(Clone)]
pub struct EventEmitter {
    tx: Option<mpsc::Sender<RequestEvent>>,
    metrics: RequestMetrics,
}

impl EventEmitter {
    /// An emitter that discards everything (for tests and tools).
    pub fn noop() -> Self {
        Self {
            tx: None,
            metrics: RequestMetrics::new(),
        }
    }

    /// Emit an event. Never blocks; drops on queue saturation.
    pub fn emit(&self, event: RequestEvent) {
        let Some(tx) = &self.tx else {
            return;
        };

        if tx.try_send(event).is_err() {
            self.metrics.event_dropped();
            warn!("Event queue saturated, dropping notification");
        }
    }
}

/// Channel-fed observer fan-out with a bounded worker pool.
pub struct EventFanout {
    control_tx: mpsc::Sender<ControlMsg>,
    event_tx: mpsc::Sender<RequestEvent>,
    next_id: AtomicU64,
    dispatcher: JoinHandle<()>,
}

impl EventFanout {
    pub fn new(pool_size: usize) -> Self {
        let (control_tx, control_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);

        let dispatcher = tokio::spawn(dispatch_loop(control_rx, event_rx, pool_size));

        Self {
            control_tx,
            event_tx,
            next_id: AtomicU64::new(1),
            dispatcher,
        }
    }

    /// Get an emitter handle for producers.
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter {
            tx: Some(self.event_tx.clone()),
            metrics: RequestMetrics::new(),
        }
    }

    /// Register an observer; returns a token for deregistration.
    pub async fn register(&self, observer: Arc<dyn RequestObserver>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let _ = self
            .control_tx
            .send(ControlMsg::Register { id, observer })
            .await;
        id
    }

    /// Deregister a previously registered observer.
    pub async fn deregister(&self, id: u64) {
        let _ = self.control_tx.send(ControlMsg::Deregister { id }).await;
    }

    /// Stop the dispatcher. In-flight notifications may be abandoned.
    pub fn shutdown(&self) {
        self.dispatcher.abort();
    }
}

async fn dispatch_loop(
    mut control_rx: mpsc::Receiver<ControlMsg>,
    mut event_rx: mpsc::Receiver<RequestEvent>,
    pool_size: usize,
) {
    let mut observers: Vec<(u64, Arc<dyn RequestObserver>)> = Vec::new();
    let pool = Arc::new(Semaphore::new(pool_size));
    let metrics = RequestMetrics::new();

    loop {
        tokio::select! {
            control = control_rx.recv() => {
                match control {
                    Some(ControlMsg::Register { id, observer }) => {
                        debug!(id, observer = observer.name(), "Observer registered");
                        observers.push((id, observer));
                    }
                    Some(ControlMsg::Deregister { id }) => {
                        observers.retain(|(observer_id, _)| *observer_id != id);
                        debug!(id, "Observer deregistered");
                    }
                    None => break,
                }
            }
            event = event_rx.recv() => {
                let Some(event) = event else { break };

                for (_, observer) in &observers {
                    match pool.clone().try_acquire_owned() {
                        Ok(permit) => {
                            let observer = observer.clone();
                            let event = event.clone();
                            tokio::spawn(async move {
                                let _permit = permit;
                                observer.notify(&event).await;
                            });
                        }
                        Err(_) => {
                            metrics.event_dropped();
                            debug!(
                                observer = observer.name(),
                                "Notification pool saturated, dropping"
                            );
                        }
                    }
                }
            }
        }
    }
}
