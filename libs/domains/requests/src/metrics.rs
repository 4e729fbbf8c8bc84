//! Request-level metrics.

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Counters and gauges for the request lifecycle.
#[derive(Clone, Default)]
pub struct RequestMetrics;

impl RequestMetrics {
    pub fn new() -> Self {
        Self
    }

    /// A request was registered and published.
    pub fn request_registered(&self, subject: &str) {
        counter!("requests.total", "subject" => subject.to_string()).increment(1);
    }

    /// A correlated response resolved the request successfully.
    pub fn request_successful(&self, subject: &str) {
        counter!("requests.successful", "subject" => subject.to_string()).increment(1);
    }

    /// A correlated response resolved the request as failed.
    pub fn request_failed(&self, subject: &str) {
        counter!("requests.failed", "subject" => subject.to_string()).increment(1);
    }

    /// The sweeper timed the request out.
    pub fn request_timeout(&self) {
        counter!("requests.timeout").increment(1);
    }

    /// Round-trip latency from registration to terminal transition.
    pub fn request_duration(&self, duration: Duration) {
        histogram!("request.duration").record(duration.as_secs_f64());
    }

    /// Current number of PENDING rows.
    pub fn pending_requests(&self, count: usize) {
        gauge!("requests.pending").set(count as f64);
    }

    /// A response lost the conditional-update race.
    pub fn duplicate_response(&self, subject: &str) {
        counter!("duplicate_response", "subject" => subject.to_string()).increment(1);
    }

    /// An observer notification was dropped on pool saturation.
    pub fn event_dropped(&self) {
        counter!("events.dropped").increment(1);
    }
}
