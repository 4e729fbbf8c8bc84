use crate::{env_or_default, ConfigError, FromEnv};
use std::env;

/// Credentials for the NATS connection.
///
/// Exactly one scheme applies; precedence when several are set is
/// credentials file, then token, then username/password.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NatsAuth {
    None,
    UserPassword { username: String, password: String },
    Token(String),
    CredentialsFile(String),
}

/// NATS connection configuration
#[derive(Clone, Debug)]
pub struct NatsConfig {
    pub url: String,
    pub auth: NatsAuth,
}

impl NatsConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth: NatsAuth::None,
        }
    }
}

impl FromEnv for NatsConfig {
    /// Reads from environment variables:
    /// - NATS_URL: defaults to nats://localhost:4222
    /// - NATS_CREDS_FILE | NATS_TOKEN | NATS_USERNAME + NATS_PASSWORD: optional auth
    fn from_env() -> Result<Self, ConfigError> {
        let url = env_or_default("NATS_URL", "nats://localhost:4222");

        let auth = if let Ok(creds) = env::var("NATS_CREDS_FILE") {
            NatsAuth::CredentialsFile(creds)
        } else if let Ok(token) = env::var("NATS_TOKEN") {
            NatsAuth::Token(token)
        } else if let Ok(username) = env::var("NATS_USERNAME") {
            let password = env::var("NATS_PASSWORD")
                .map_err(|_| ConfigError::MissingEnvVar("NATS_PASSWORD".to_string()))?;
            NatsAuth::UserPassword { username, password }
        } else {
            NatsAuth::None
        };

        Ok(Self { url, auth })
    }
}
