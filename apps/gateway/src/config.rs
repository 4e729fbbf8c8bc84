use core_config::gateway::{ConsumerTuning, RecoverySettings, ShutdownSettings, TimeoutSettings};
use core_config::nats::NatsConfig;
use core_config::{env_parse, pod_id, ConfigError, Environment, FromEnv};
use database::postgres::PostgresConfig;

/// Full configuration of one gateway instance.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub environment: Environment,
    pub health_port: u16,
    pub pod_id: String,
    pub nats: NatsConfig,
    pub postgres: PostgresConfig,
    pub consumer: ConsumerTuning,
    pub timeout: TimeoutSettings,
    pub recovery: RecoverySettings,
    pub shutdown: ShutdownSettings,
}

impl GatewayConfig {
    /// Audit actor tag written to created_by/updated_by.
    pub fn actor(&self) -> String {
        format!("gateway@{}", self.pod_id)
    }
}

impl FromEnv for GatewayConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            environment: Environment::from_env(),
            health_port: env_parse("HEALTH_PORT", 8081u16)?,
            pod_id: pod_id(),
            nats: NatsConfig::from_env()?,
            postgres: PostgresConfig::from_env()?,
            consumer: ConsumerTuning::from_env()?,
            timeout: TimeoutSettings::from_env()?,
            recovery: RecoverySettings::from_env()?,
            shutdown: ShutdownSettings::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_gateway_config_minimal_env() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("postgres://localhost/gateway")),
                ("NATS_URL", None),
                ("HEALTH_PORT", None),
                ("POD_ID", Some("pod-test")),
            ],
            || {
                let config = GatewayConfig::from_env().unwrap();
                assert_eq!(config.health_port, 8081);
                assert_eq!(config.nats.url, "nats://localhost:4222");
                assert_eq!(config.pod_id, "pod-test");
                assert_eq!(config.actor(), "gateway@pod-test");
                assert_eq!(config.timeout.default_timeout, Duration::from_secs(30));
            },
        );
    }

    #[test]
    fn test_gateway_config_requires_database_url() {
        temp_env::with_var_unset("DATABASE_URL", || {
            let result = GatewayConfig::from_env();
            assert!(result.is_err());
        });
    }

    #[test]
    fn test_gateway_config_invalid_health_port() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("postgres://localhost/gateway")),
                ("HEALTH_PORT", Some("not-a-port")),
            ],
            || {
                let result = GatewayConfig::from_env();
                assert!(result.is_err());
                assert!(result.unwrap_err().to_string().contains("HEALTH_PORT"));
            },
        );
    }
}
