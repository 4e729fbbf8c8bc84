//! Periodic marking of overdue pending requests.

use chrono::{Duration as ChronoDuration, Utc};
use core_config::gateway::TimeoutSettings;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::events::{EventEmitter, RequestEvent};
use crate::metrics::RequestMetrics;
use crate::models::RequestStatus;
use crate::repository::RequestLogRepository;

/// Rows examined per sweep; keeps a backlog from starving one tick.
const SWEEP_BATCH_LIMIT: u64 = 1000;

/// Races responses for PENDING rows and marks the overdue ones TIMEOUT.
///
/// The sweeper and the correlation engine both go through conditional
/// updates; whoever writes first wins and the loser's update affects
/// zero rows.
pub struct TimeoutSweeper {
    store: Arc<dyn RequestLogRepository>,
    settings: TimeoutSettings,
    emitter: EventEmitter,
    metrics: RequestMetrics,
    actor: String,
}

impl TimeoutSweeper {
    pub fn new(
        store: Arc<dyn RequestLogRepository>,
        settings: TimeoutSettings,
        emitter: EventEmitter,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            store,
            settings,
            emitter,
            metrics: RequestMetrics::new(),
            actor: actor.into(),
        }
    }

    /// Run on a fixed schedule until shutdown.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            sweep_rate_ms = self.settings.sweep_rate.as_millis() as u64,
            default_timeout_s = self.settings.default_timeout.as_secs(),
            "Timeout sweeper starting"
        );

        let mut interval = tokio::time::interval(self.settings.sweep_rate);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.sweep_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Timeout sweeper stopping");
                        break;
                    }
                }
            }
        }
    }

    /// One scan: mark every overdue PENDING row, tolerating per-row
    /// failures. Returns how many rows this sweep transitioned.
    pub async fn sweep_once(&self) -> u64 {
        let now = Utc::now();
        let default_timeout = match ChronoDuration::from_std(self.settings.default_timeout) {
            Ok(timeout) => timeout,
            Err(e) => {
                error!(error = %e, "Invalid default timeout, skipping sweep");
                return 0;
            }
        };
        let threshold = now - default_timeout;

        let overdue = match self
            .store
            .find_timed_out(threshold, now, SWEEP_BATCH_LIMIT)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "Sweep query failed");
                return 0;
            }
        };

        let mut marked = 0;
        for row in overdue {
            match self.store.mark_timeout(&row.request_id, now, &self.actor).await {
                Ok(1) => {
                    marked += 1;
                    self.metrics.request_timeout();
                    self.emitter.emit(RequestEvent::TimedOut {
                        request_id: row.request_id.clone(),
                    });
                    debug!(request_id = %row.request_id, "Request marked TIMEOUT");
                }
                Ok(_) => {
                    // A response won the race after our scan; not an error
                    debug!(request_id = %row.request_id, "Timeout lost the race");
                }
                Err(e) => {
                    // One bad row must not abort the sweep
                    error!(request_id = %row.request_id, error = %e, "Failed to mark timeout");
                }
            }
        }

        if marked > 0 {
            info!(marked, "Sweep transitioned overdue requests");
        }

        // Keep the pending gauge fresh on the sweeper cadence
        if let Ok(pending) = self.store.find_by_status(RequestStatus::Pending).await {
            self.metrics.pending_requests(pending.len());
        }

        marked
    }
}
