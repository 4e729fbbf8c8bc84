//! Startup recovery: re-arm listeners for requests still pending.

use core_config::gateway::RecoverySettings;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::RequestResult;
use crate::listener::ListenerControl;
use crate::models::RequestStatus;
use crate::repository::{RecoveryLockRepository, RequestLogRepository};

/// What a recovery attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Another instance holds the lock; nothing to do here
    Skipped,
    /// Recovery ran; listeners re-armed for the distinct keys found
    Completed { listeners_armed: usize },
}

/// One-shot startup service, singleton across instances via the lease
/// lock.
pub struct RecoveryService {
    lock: Arc<dyn RecoveryLockRepository>,
    store: Arc<dyn RequestLogRepository>,
    listeners: Arc<dyn ListenerControl>,
    settings: RecoverySettings,
    pod_id: String,
}

impl RecoveryService {
    pub fn new(
        lock: Arc<dyn RecoveryLockRepository>,
        store: Arc<dyn RequestLogRepository>,
        listeners: Arc<dyn ListenerControl>,
        settings: RecoverySettings,
        pod_id: impl Into<String>,
    ) -> Self {
        Self {
            lock,
            store,
            listeners,
            settings,
            pod_id: pod_id.into(),
        }
    }

    /// Attempt recovery once, after storage and bus are ready.
    pub async fn run_once(&self) -> RequestResult<RecoveryOutcome> {
        if !self
            .lock
            .try_acquire(&self.pod_id, self.settings.lock_ttl)
            .await?
        {
            info!(pod_id = %self.pod_id, "Recovery lock held elsewhere, skipping recovery");
            return Ok(RecoveryOutcome::Skipped);
        }

        let pending = self.store.find_by_status(RequestStatus::Pending).await?;
        info!(count = pending.len(), "Recovering listeners for pending requests");

        let mut armed = HashSet::new();
        for row in pending {
            let Some(key) = row.listener_key() else {
                // Rows without a bound response path cannot be recovered
                warn!(
                    request_id = %row.request_id,
                    "Pending request has no listener binding, skipping"
                );
                continue;
            };

            if armed.contains(&key) {
                continue;
            }

            match self
                .listeners
                .ensure_listener_active(&key.subject, &key.id_field)
                .await
            {
                Ok(()) => {
                    armed.insert(key);
                }
                Err(e) => {
                    // Other rows still deserve their listeners
                    error!(key = %key, error = %e, "Failed to re-arm listener");
                }
            }
        }

        self.lock.complete(&self.pod_id).await?;

        info!(listeners_armed = armed.len(), "Recovery completed");
        Ok(RecoveryOutcome::Completed {
            listeners_armed: armed.len(),
        })
    }
}
