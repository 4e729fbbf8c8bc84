//! Durable request/response domain.
//!
//! A caller binds a request to a response path; the gateway persists it,
//! publishes it, and correlates inbound messages back to the pending row
//! by an id carried in the JSON payload. Terminal transitions are
//! compare-and-set updates, so a response racing the timeout sweeper can
//! never double-transition a request.
//!
//! # Modules
//!
//! - [`models`]: statuses, listener keys, subject classification
//! - [`repository`]: persistence traits ([`postgres`] implements them)
//! - [`correlation`]: inbound message → pending row matching
//! - [`listener`]: at-most-one pull fetcher per `(subject, id_field)`
//! - [`orchestrator`]: publish + register pending
//! - [`sweeper`]: periodic timeout marking
//! - [`recovery`]: startup re-arming of listeners, behind a lease lock
//! - [`events`]: fire-and-forget observer fan-out

pub mod correlation;
pub mod entity;
pub mod error;
pub mod events;
pub mod listener;
pub mod lock;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod postgres;
pub mod recovery;
pub mod repository;
pub mod sweeper;

pub use correlation::CorrelationEngine;
pub use error::{RequestError, RequestResult};
pub use events::{EventFanout, RequestEvent, RequestObserver};
pub use listener::{ListenerControl, ListenerManager};
pub use models::{ListenerKey, NewRequest, RequestLog, RequestStatus, ResponseKind};
pub use orchestrator::{Publisher, RequestOrchestrator};
pub use postgres::{PgRecoveryLockRepository, PgRequestLogRepository};
pub use recovery::RecoveryService;
pub use repository::{RecoveryLockRepository, RequestLogRepository};
pub use sweeper::TimeoutSweeper;
