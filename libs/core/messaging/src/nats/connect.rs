//! NATS connection bootstrap.

use crate::nats::error::NatsError;
use core_config::nats::{NatsAuth, NatsConfig};
use tracing::info;

/// Connect to NATS using the configured auth scheme.
///
/// The returned client is cheap to clone and shared by the publisher and
/// every pull consumer.
pub async fn connect(config: &NatsConfig) -> Result<async_nats::Client, NatsError> {
    info!(url = %config.url, "Connecting to NATS...");

    let client = match &config.auth {
        NatsAuth::None => async_nats::connect(&config.url).await?,
        NatsAuth::UserPassword { username, password } => {
            async_nats::ConnectOptions::with_user_and_password(
                username.clone(),
                password.clone(),
            )
            .connect(&config.url)
            .await?
        }
        NatsAuth::Token(token) => {
            async_nats::ConnectOptions::with_token(token.clone())
                .connect(&config.url)
                .await?
        }
        NatsAuth::CredentialsFile(path) => {
            async_nats::ConnectOptions::with_credentials_file(path.clone())
                .await
                .map_err(|e| NatsError::Config(format!("credentials file {}: {}", path, e)))?
                .connect(&config.url)
                .await?
        }
    };

    info!("Connected to NATS successfully");
    Ok(client)
}
