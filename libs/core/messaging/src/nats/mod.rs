//! NATS JetStream backend for the gateway.
//!
//! Durable pull consumers feed a per-listener fetch loop; a persistent
//! publisher carries outbound requests. Both sides share one connection.
//!
//! # Key features
//!
//! - **Durable pull consumers**: deterministic names derived from the
//!   subject, so instances sharing a name load-balance
//! - **Batched fetch loop**: per-subject isolation with exponential
//!   back-off on pull failures
//! - **Persistent publish**: JetStream ack with `{stream, sequence}`
//! - **Health endpoints**: K8s-ready liveness/readiness probes
//! - **Prometheus metrics**: pulls, processing outcomes, publish latency

mod connect;
mod consumer;
mod error;
mod fetcher;
mod health;
pub mod metrics;
mod processor;
mod publisher;

pub use connect::connect;
pub use consumer::{consumer_name, stream_name, PulledMessage, SubjectConsumer};
pub use error::NatsError;
pub use fetcher::PullFetcher;
pub use health::{HealthServer, HealthState, HealthStatus};
pub use metrics::{init_metrics, ConsumerMetrics, PublisherMetrics};
pub use processor::MessageProcessor;
pub use publisher::{NatsPublisher, PublishAck};
