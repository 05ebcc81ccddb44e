use crate::{env_or_default, env_parse, env_required, ConfigError, FromEnv};
use std::fmt;
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://pricing.api.infracost.io";

/// Pricing catalog API connection
#[derive(Clone)]
pub struct CatalogConfig {
    pub endpoint: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl CatalogConfig {
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self {
            endpoint,
            api_key,
            timeout: Duration::from_secs(10),
        }
    }
}

// Keeps the key out of logs
impl fmt::Debug for CatalogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl FromEnv for CatalogConfig {
    /// - PRICING_API_ENDPOINT: defaults to the public catalog
    /// - PRICING_API_KEY: required
    /// - PRICING_API_TIMEOUT_SECS: defaults to 10
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: env_or_default("PRICING_API_ENDPOINT", DEFAULT_ENDPOINT),
            api_key: env_required("PRICING_API_KEY")?,
            timeout: Duration::from_secs(env_parse("PRICING_API_TIMEOUT_SECS", 10)?),
        })
    }
}
