//! Configuration for the cost estimator

use core_config::{CatalogConfig, ConfigError, EstimatorConfig, FromEnv};
use domain_cost_estimation::{EstimatorOptions, RetryPolicy};
use std::num::NonZeroU32;

#[derive(Debug, Clone)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub estimator: EstimatorConfig,
}

impl FromEnv for Config {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            catalog: CatalogConfig::from_env()?,
            estimator: EstimatorConfig::from_env()?,
        })
    }
}

impl Config {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.estimator.retry_attempts, self.estimator.retry_base_delay)
    }

    /// `None` when the catalog is not rate limited
    pub fn rate_limit(&self) -> Option<NonZeroU32> {
        NonZeroU32::new(self.estimator.max_requests_per_second)
    }

    pub fn estimator_options(&self) -> EstimatorOptions {
        EstimatorOptions {
            default_region: self.estimator.default_region.clone(),
            currency: self.estimator.currency.clone(),
            max_concurrency: self.estimator.max_concurrency,
        }
    }
}
