//! Request/Response Gateway (NATS JetStream)
//!
//! A durable request/response gateway: callers submit a request bound to
//! a subject; the gateway persists it, publishes it, and correlates
//! inbound responses back to the pending row by an id carried in the
//! JSON payload.
//!
//! ## Architecture
//!
//! ```text
//! caller ──▶ RequestOrchestrator ──▶ RequestLogStore (PENDING)
//!                     │
//!                     ├──▶ ListenerManager (arm pull consumer)
//!                     └──▶ NATS JetStream (persistent publish)
//!                                  │
//!          … later …               ▼
//!            PullFetcher ──▶ MessageProcessor ──▶ CorrelationEngine
//!                                                       │
//!                                    RequestLogStore (PENDING → terminal)
//!                                                       ▲
//!                                      TimeoutSweeper ──┘ (races responses)
//! ```
//!
//! ## Features
//!
//! - Durable pull consumers, shared and load-balanced across instances
//! - Compare-and-set state transitions; races never double-transition
//! - Startup recovery behind a lease lock, one instance at a time
//! - Graceful shutdown draining listener workers
//! - Health endpoints and Prometheus metrics

mod config;

pub use config::GatewayConfig;

use database::common::RetryConfig;
use database::postgres::{connect_from_config_with_retry, run_migrations};
use domain_requests::events::{EventFanout, LoggingObserver, DEFAULT_POOL_SIZE};
use domain_requests::models::NewRequest;
use domain_requests::{
    CorrelationEngine, ListenerControl, ListenerManager, PgRecoveryLockRepository,
    PgRequestLogRepository, RecoveryService, RequestOrchestrator, RequestResult, TimeoutSweeper,
};
use eyre::WrapErr;
use messaging::nats::{HealthServer, NatsPublisher};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// A fully wired gateway instance.
///
/// The HTTP/CLI surface sits on top of [`RunningGateway::send_request`];
/// callers poll the store for resolution or register observers on the
/// event fan-out.
pub struct RunningGateway {
    orchestrator: Arc<RequestOrchestrator>,
    pub store: Arc<PgRequestLogRepository>,
    pub events: Arc<EventFanout>,
    listeners: Arc<ListenerManager>,
    sweeper: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl RunningGateway {
    /// Submit a request; returns its durable request id.
    pub async fn send_request(&self, input: NewRequest) -> RequestResult<String> {
        self.orchestrator.send_request(input).await
    }

    /// Keys with an active listener worker.
    pub async fn active_listeners(&self) -> Vec<domain_requests::ListenerKey> {
        self.listeners.active_keys().await
    }

    /// Drain and stop: listeners first, then the sweeper and fan-out.
    pub async fn shutdown(self) {
        info!("Shutdown requested, draining");
        let _ = self.shutdown.send(true);

        self.listeners.stop_all().await;
        let _ = self.sweeper.await;
        self.events.shutdown();

        info!("Gateway stopped");
    }
}

/// Connect, migrate, recover and start the background services.
///
/// # Errors
///
/// Returns an error if:
/// - The database is unreachable after retries, or migrations fail
/// - The NATS connection cannot be established
/// - Startup recovery hits a storage failure
pub async fn start(config: GatewayConfig) -> eyre::Result<RunningGateway> {
    // Initialize Prometheus metrics; in-process restarts reuse the
    // already-installed recorder
    let metrics_handle = messaging::nats::init_metrics();

    info!(
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        pod_id = %config.pod_id,
        environment = ?config.environment,
        "Starting request/response gateway"
    );

    // Storage first: nothing is durable without it
    let db = connect_from_config_with_retry(
        config.postgres.clone(),
        RetryConfig::new().with_max_retries(5),
    )
    .await
    .wrap_err("Failed to connect to PostgreSQL")?;

    run_migrations::<migration::Migrator>(&db, "gateway")
        .await
        .wrap_err("Failed to run migrations")?;

    // Then the bus
    let nats_client = messaging::nats::connect(&config.nats)
        .await
        .wrap_err_with(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    let jetstream = Arc::new(async_nats::jetstream::new(nats_client));
    info!("JetStream context created");

    // Health server in the background
    let health_server = HealthServer::new(config.health_port).with_metrics(metrics_handle);
    let health_state = health_server.state();
    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            error!(error = %e, "Health server failed");
        }
    });

    // Observer fan-out, off the correlation critical path
    let events = Arc::new(EventFanout::new(DEFAULT_POOL_SIZE));
    events.register(Arc::new(LoggingObserver)).await;
    let emitter = events.emitter();

    let actor = config.actor();
    let store = Arc::new(PgRequestLogRepository::new(db.clone()));
    let lock_repo = Arc::new(PgRecoveryLockRepository::new(db.clone()));

    let engine = Arc::new(CorrelationEngine::new(
        store.clone(),
        emitter.clone(),
        actor.clone(),
    ));

    let listeners = Arc::new(ListenerManager::new(
        jetstream.clone(),
        config.consumer.clone(),
        config.shutdown.grace,
        engine,
    ));

    let publisher = Arc::new(NatsPublisher::new(jetstream.clone()));
    let orchestrator = Arc::new(RequestOrchestrator::new(
        store.clone(),
        publisher,
        listeners.clone(),
        emitter.clone(),
        actor.clone(),
    ));

    // Re-arm listeners for requests that were pending when we died
    let recovery = RecoveryService::new(
        lock_repo,
        store.clone(),
        listeners.clone(),
        config.recovery.clone(),
        config.pod_id.clone(),
    );
    recovery
        .run_once()
        .await
        .wrap_err("Startup recovery failed")?;

    // Sweeper runs until shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = TimeoutSweeper::new(store.clone(), config.timeout.clone(), emitter, actor);
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown_rx));

    health_state.set_bus_connected(true).await;
    health_state.set_store_healthy(true).await;
    info!("Gateway ready");

    Ok(RunningGateway {
        orchestrator,
        store,
        events,
        listeners,
        sweeper: sweeper_handle,
        shutdown: shutdown_tx,
    })
}

/// Run the gateway until SIGINT/SIGTERM.
pub async fn run(config: GatewayConfig) -> eyre::Result<()> {
    let gateway = start(config).await?;

    shutdown_signal().await;
    gateway.shutdown().await;

    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        },
    }
}
