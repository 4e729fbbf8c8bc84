//! Bus abstractions for the durable request/response gateway.
//!
//! This library provides backend-agnostic types for correlating inbound
//! messages to pending requests, plus a NATS JetStream backend behind the
//! `nats` feature.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌─────────────────────┐     ┌──────────────────┐
//! │  NatsPublisher   │────▶│   NATS JetStream    │────▶│   PullFetcher    │
//! │ (persistent ack) │     │  (durable streams)  │     │ (batched pulls)  │
//! └──────────────────┘     └─────────────────────┘     └──────────────────┘
//!                                                               │
//!                                                               ▼
//!                                                      ┌──────────────────┐
//!                                                      │ MessageProcessor │
//!                                                      │ (id extraction)  │
//!                                                      └──────────────────┘
//!                                                               │
//!                                                               ▼
//!                                                      ┌──────────────────┐
//!                                                      │  MessageHandler  │
//!                                                      │  (your logic)    │
//!                                                      └──────────────────┘
//! ```
//!
//! # Key pieces
//!
//! - [`MessageReceived`]: normalized inbound message with the extracted
//!   correlation id
//! - [`MessageHandler`]: seam between the fetch loop and the domain
//! - [`RetryPolicy`]: back-off selection for the fetch loop
//! - `nats::PullFetcher`: durable pull-consumer loop (one per listener)
//! - `nats::NatsPublisher`: persistent publish with `{stream, sequence}` ack

// Core modules (always available)
mod backoff;
mod error;
mod handler;
mod message;

// Core exports
pub use backoff::RetryPolicy;
pub use error::{ErrorCategory, ProcessingError};
pub use handler::{MessageHandler, NoOpHandler};
pub use message::MessageReceived;

// NATS module (feature-gated)
#[cfg(feature = "nats")]
pub mod nats;

// Re-export common NATS types at crate root for convenience
#[cfg(feature = "nats")]
pub use nats::{
    consumer_name, HealthServer, HealthState, MessageProcessor, NatsError, NatsPublisher,
    PublishAck, PullFetcher, SubjectConsumer,
};
