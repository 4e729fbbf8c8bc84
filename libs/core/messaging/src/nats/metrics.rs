//! Prometheus metrics for the bus layer.

use metrics::{counter, gauge, histogram};
use std::sync::OnceLock;
use std::time::Duration;

/// Metrics emitted by a pull-consumer fetch loop.
#[derive(Clone)]
pub struct ConsumerMetrics {
    subject: String,
}

impl ConsumerMetrics {
    pub fn new(subject: &str) -> Self {
        Self {
            subject: subject.to_string(),
        }
    }

    /// Record messages pulled in a batch.
    pub fn pulled(&self, count: u64, status: &str) {
        counter!(
            "consumer.messages.pulled",
            "subject" => self.subject.clone(),
            "status" => status.to_string()
        )
        .increment(count);
    }

    /// Record a processed message outcome.
    pub fn processed(&self, status: &str) {
        counter!(
            "consumer.messages.processed",
            "subject" => self.subject.clone(),
            "status" => status.to_string()
        )
        .increment(1);
    }

    /// Record a fetch-loop error.
    pub fn error(&self, kind: &str) {
        counter!(
            "consumer.errors",
            "subject" => self.subject.clone(),
            "type" => kind.to_string()
        )
        .increment(1);
    }
}

/// Metrics emitted by the publish path.
#[derive(Clone, Default)]
pub struct PublisherMetrics;

impl PublisherMetrics {
    pub fn new() -> Self {
        Self
    }

    /// Record a persistent publish and its latency.
    pub fn published(&self, subject: &str, duration: Duration) {
        counter!(
            "messages.published",
            "subject" => subject.to_string()
        )
        .increment(1);

        histogram!(
            "publish.duration",
            "subject" => subject.to_string()
        )
        .record(duration.as_secs_f64());
    }
}

/// Update the active-listener gauge.
pub fn set_active_connections(count: usize) {
    gauge!("connections.active").set(count as f64);
}

static RECORDER: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Initialize Prometheus metrics.
///
/// Installing a global recorder twice is an error, so the handle is
/// kept process-wide and handed back on repeat calls.
pub fn init_metrics() -> metrics_exporter_prometheus::PrometheusHandle {
    RECORDER
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("Failed to install Prometheus recorder")
        })
        .clone()
}
