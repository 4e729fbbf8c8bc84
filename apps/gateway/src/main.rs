//! Request/Response Gateway - Entry Point
//!
//! Binary entry point for the NATS request/response gateway.
//!
//! Exit codes: 0 on normal shutdown, 1 on fatal startup error, 2 on
//! configuration error.

use core_config::{Environment, FromEnv};

#[tokio::main]
async fn main() {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    let config = match gateway::GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = gateway::run(config).await {
        eprintln!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}
