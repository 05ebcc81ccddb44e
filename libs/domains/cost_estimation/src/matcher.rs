//! Price Matcher
//!
//! Resolves a [`PriceSpec`] to a catalog price. Results are cached by
//! [`PriceHash`] for the lifetime of the matcher, and concurrent requests for
//! the same hash share a single in-flight catalog call.
//!
//! ```text
//!  match_price(spec)
//!        │
//!        v
//!  cache[hash] ──(initialized)──> cached outcome
//!        │
//!   (first caller)
//!        v
//!  rate limit ─> timeout(catalog.query) ─┬─ Ok(Some)  -> Found
//!        ^                               ├─ Ok(None)  -> NotFound
//!        │                               ├─ fatal     -> Err(CatalogAuth)
//!        └──── backoff <── retryable ────┴─ exhausted -> Failed
//! ```

use dashmap::DashMap;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use observability::EstimationMetrics;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::{debug, error, warn};

use crate::catalog::{CatalogError, CatalogPrice, CatalogQuery, PricingCatalog};
use crate::error::{EstimationError, EstimationResult};
use crate::price_spec::{PriceHash, PriceSpec};

/// What the catalog said about a price spec.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Found(CatalogPrice),
    /// No SKU matches; the component is reported unpriced
    NotFound,
    /// Retries exhausted or the response was unusable
    Failed(String),
}

impl MatchOutcome {
    fn label(&self) -> &'static str {
        match self {
            MatchOutcome::Found(_) => "found",
            MatchOutcome::NotFound => "not_found",
            MatchOutcome::Failed(_) => "failed",
        }
    }
}

/// Exponential backoff for retryable catalog errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Self::default()
        }
    }

    /// Delay before retrying after the given (1-based) failed attempt.
    /// A server-provided `Retry-After` wins over the computed backoff.
    pub fn delay_for(&self, attempt: u32, error: &CatalogError) -> Duration {
        if let CatalogError::RateLimited {
            retry_after: Some(after),
        } = error
        {
            return (*after).min(self.max_delay);
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

pub struct PriceMatcher {
    catalog: Arc<dyn PricingCatalog>,
    cache: DashMap<PriceHash, Arc<OnceCell<MatchOutcome>>>,
    retry: RetryPolicy,
    query_timeout: Duration,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl PriceMatcher {
    pub fn new(catalog: Arc<dyn PricingCatalog>) -> Self {
        Self {
            catalog,
            cache: DashMap::new(),
            retry: RetryPolicy::default(),
            query_timeout: Duration::from_secs(10),
            limiter: None,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Cap outgoing catalog queries per second.
    pub fn with_rate_limit(mut self, per_second: NonZeroU32) -> Self {
        self.limiter = Some(RateLimiter::direct(Quota::per_second(per_second)));
        self
    }

    /// Number of distinct price hashes seen so far.
    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    /// Resolve `spec`, querying the catalog at most once per price hash.
    ///
    /// Only a fatal catalog error (rejected credentials) is returned as
    /// `Err`; everything else becomes a [`MatchOutcome`].
    pub async fn match_price(&self, spec: &PriceSpec) -> EstimationResult<MatchOutcome> {
        let hash = spec.hash();
        let cell = self.cache.entry(hash.clone()).or_default().clone();

        if let Some(outcome) = cell.get() {
            EstimationMetrics::record_cache_hit();
            return Ok(outcome.clone());
        }

        let outcome = cell.get_or_try_init(|| self.lookup(&hash, spec)).await?;
        Ok(outcome.clone())
    }

    async fn lookup(&self, hash: &PriceHash, spec: &PriceSpec) -> EstimationResult<MatchOutcome> {
        let query = CatalogQuery::from(spec);
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;
            if let Some(limiter) = &self.limiter {
                limiter.until_ready().await;
            }

            let query_result =
                tokio::time::timeout(self.query_timeout, self.catalog.query(&query)).await;
            let result = match query_result {
                Ok(result) => result,
                Err(_) => Err(CatalogError::Timeout(self.query_timeout)),
            };

            let outcome = match result {
                Ok(Some(price)) => MatchOutcome::Found(price),
                Ok(None) => {
                    debug!(price_hash = %hash, service = %query.service, "No matching price");
                    MatchOutcome::NotFound
                }
                Err(e) if e.is_fatal() => {
                    error!(price_hash = %hash, error = %e, "Pricing catalog rejected credentials");
                    EstimationMetrics::record_lookup("unauthorized", started.elapsed());
                    return Err(EstimationError::CatalogAuth(e.to_string()));
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt, &e);
                    warn!(
                        price_hash = %hash,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying price lookup"
                    );
                    EstimationMetrics::record_retry();
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(e) => {
                    warn!(
                        price_hash = %hash,
                        attempts = attempt,
                        error = %e,
                        "Price lookup failed"
                    );
                    MatchOutcome::Failed(e.to_string())
                }
            };

            EstimationMetrics::record_lookup(outcome.label(), started.elapsed());
            return Ok(outcome);
        }
    }
}
