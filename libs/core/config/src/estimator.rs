use crate::{env_or_default, env_parse, ConfigError, FromEnv};
use std::time::Duration;

/// Estimation run tuning
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EstimatorConfig {
    pub max_concurrency: usize,
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
    /// Catalog queries per second; 0 disables the limit
    pub max_requests_per_second: u32,
    pub default_region: String,
    pub currency: String,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(200),
            max_requests_per_second: 0,
            default_region: "us-east-1".to_string(),
            currency: "USD".to_string(),
        }
    }
}

impl FromEnv for EstimatorConfig {
    /// Reads ESTIMATOR_* variables; every value has a default.
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let max_concurrency: usize =
            env_parse("ESTIMATOR_MAX_CONCURRENCY", defaults.max_concurrency)?;
        if max_concurrency == 0 {
            return Err(ConfigError::ParseError {
                key: "ESTIMATOR_MAX_CONCURRENCY".to_string(),
                details: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            max_concurrency,
            retry_attempts: env_parse("ESTIMATOR_RETRY_ATTEMPTS", defaults.retry_attempts)?,
            retry_base_delay: Duration::from_millis(env_parse(
                "ESTIMATOR_RETRY_BASE_DELAY_MS",
                200,
            )?),
            max_requests_per_second: env_parse(
                "ESTIMATOR_MAX_REQUESTS_PER_SECOND",
                defaults.max_requests_per_second,
            )?,
            default_region: env_or_default("ESTIMATOR_DEFAULT_REGION", &defaults.default_region),
            currency: env_or_default("ESTIMATOR_CURRENCY", &defaults.currency),
        })
    }
}
