use crate::{env_parse, ConfigError, FromEnv};
use std::time::Duration;

/// Tuning for the pull-consumer fetch loop.
#[derive(Clone, Debug)]
pub struct ConsumerTuning {
    /// Maximum messages per pull
    pub batch_size: usize,

    /// How long a pull waits for messages before returning empty
    pub max_wait: Duration,

    /// Pause between pulls (0 = immediate next pull)
    pub poll_interval: Duration,

    /// Initial back-off delay after a failed pull
    pub backoff_initial: Duration,

    /// Multiplier applied per consecutive failure
    pub backoff_multiplier: f64,

    /// Back-off ceiling
    pub backoff_max: Duration,

    /// Nak (redeliver) messages whose handler failed; false drops them with an ack
    pub nak_on_error: bool,
}

impl Default for ConsumerTuning {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_wait: Duration::from_secs(1),
            poll_interval: Duration::ZERO,
            backoff_initial: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            backoff_max: Duration::from_secs(30),
            nak_on_error: false,
        }
    }
}

impl FromEnv for ConsumerTuning {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            batch_size: env_parse("CONSUMER_BATCH_SIZE", defaults.batch_size)?,
            max_wait: Duration::from_millis(env_parse(
                "CONSUMER_MAX_WAIT_MS",
                defaults.max_wait.as_millis() as u64,
            )?),
            poll_interval: Duration::from_millis(env_parse("CONSUMER_POLL_INTERVAL_MS", 0u64)?),
            backoff_initial: Duration::from_millis(env_parse(
                "CONSUMER_BACKOFF_INITIAL_MS",
                defaults.backoff_initial.as_millis() as u64,
            )?),
            backoff_multiplier: env_parse(
                "CONSUMER_BACKOFF_MULTIPLIER",
                defaults.backoff_multiplier,
            )?,
            backoff_max: Duration::from_millis(env_parse(
                "CONSUMER_BACKOFF_MAX_MS",
                defaults.backoff_max.as_millis() as u64,
            )?),
            nak_on_error: env_parse("CONSUMER_NAK_ON_ERROR", defaults.nak_on_error)?,
        })
    }
}

/// Request timeout enforcement settings.
#[derive(Clone, Debug)]
pub struct TimeoutSettings {
    /// How long a request may stay PENDING before the sweeper marks it
    pub default_timeout: Duration,

    /// How often the sweeper scans for overdue requests
    pub sweep_rate: Duration,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            sweep_rate: Duration::from_millis(5000),
        }
    }
}

impl FromEnv for TimeoutSettings {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            default_timeout: Duration::from_secs(env_parse("TIMEOUT_DEFAULT_SECONDS", 30u64)?),
            sweep_rate: Duration::from_millis(env_parse("TIMEOUT_SWEEP_RATE_MILLIS", 5000u64)?),
        })
    }
}

/// Startup-recovery settings.
#[derive(Clone, Debug)]
pub struct RecoverySettings {
    /// TTL on the recovery lock lease
    pub lock_ttl: Duration,
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            lock_ttl: Duration::from_secs(60),
        }
    }
}

impl FromEnv for RecoverySettings {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            lock_ttl: Duration::from_secs(env_parse("RECOVERY_LOCK_TTL_SECONDS", 60u64)?),
        })
    }
}

/// Graceful-shutdown settings.
#[derive(Clone, Debug)]
pub struct ShutdownSettings {
    /// How long to wait for listener workers before aborting them
    pub grace: Duration,
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            grace: Duration::from_millis(10_000),
        }
    }
}

impl FromEnv for ShutdownSettings {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            grace: Duration::from_millis(env_parse("SHUTDOWN_GRACE_MILLIS", 10_000u64)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONSUMER_VARS: [&str; 7] = [
        "CONSUMER_BATCH_SIZE",
        "CONSUMER_MAX_WAIT_MS",
        "CONSUMER_POLL_INTERVAL_MS",
        "CONSUMER_BACKOFF_INITIAL_MS",
        "CONSUMER_BACKOFF_MULTIPLIER",
        "CONSUMER_BACKOFF_MAX_MS",
        "CONSUMER_NAK_ON_ERROR",
    ];

    #[test]
    fn test_consumer_tuning_defaults() {
        temp_env::with_vars(CONSUMER_VARS.map(|k| (k, None::<&str>)), || {
            let tuning = ConsumerTuning::from_env().unwrap();
            assert_eq!(tuning.batch_size, 10);
            assert_eq!(tuning.max_wait, Duration::from_secs(1));
            assert_eq!(tuning.poll_interval, Duration::ZERO);
            assert_eq!(tuning.backoff_initial, Duration::from_millis(500));
            assert_eq!(tuning.backoff_multiplier, 2.0);
            assert_eq!(tuning.backoff_max, Duration::from_secs(30));
            assert!(!tuning.nak_on_error);
        });
    }

    #[test]
    fn test_consumer_tuning_overrides() {
        temp_env::with_vars(
            [
                ("CONSUMER_BATCH_SIZE", Some("25")),
                ("CONSUMER_MAX_WAIT_MS", Some("250")),
                ("CONSUMER_NAK_ON_ERROR", Some("true")),
            ],
            || {
                let tuning = ConsumerTuning::from_env().unwrap();
                assert_eq!(tuning.batch_size, 25);
                assert_eq!(tuning.max_wait, Duration::from_millis(250));
                assert!(tuning.nak_on_error);
            },
        );
    }

    #[test]
    fn test_consumer_tuning_invalid_batch_size() {
        temp_env::with_var("CONSUMER_BATCH_SIZE", Some("lots"), || {
            let result = ConsumerTuning::from_env();
            assert!(result.is_err());
            assert!(result
                .unwrap_err()
                .to_string()
                .contains("CONSUMER_BATCH_SIZE"));
        });
    }

    #[test]
    fn test_timeout_settings_defaults() {
        temp_env::with_vars(
            [
                ("TIMEOUT_DEFAULT_SECONDS", None::<&str>),
                ("TIMEOUT_SWEEP_RATE_MILLIS", None::<&str>),
            ],
            || {
                let settings = TimeoutSettings::from_env().unwrap();
                assert_eq!(settings.default_timeout, Duration::from_secs(30));
                assert_eq!(settings.sweep_rate, Duration::from_millis(5000));
            },
        );
    }

    #[test]
    fn test_recovery_settings_override() {
        temp_env::with_var("RECOVERY_LOCK_TTL_SECONDS", Some("120"), || {
            let settings = RecoverySettings::from_env().unwrap();
            assert_eq!(settings.lock_ttl, Duration::from_secs(120));
        });
    }

    #[test]
    fn test_shutdown_settings_defaults() {
        temp_env::with_var_unset("SHUTDOWN_GRACE_MILLIS", || {
            let settings = ShutdownSettings::from_env().unwrap();
            assert_eq!(settings.grace, Duration::from_millis(10_000));
        });
    }
}
