//! Metrics emitted while estimating a resource graph.

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Estimation metrics recorder
pub struct EstimationMetrics;

impl EstimationMetrics {
    /// Record a completed catalog lookup; `outcome` is found, not_found, failed or unauthorized
    pub fn record_lookup(outcome: &str, duration: Duration) {
        counter!("estimation_price_lookups_total", "outcome" => outcome.to_string()).increment(1);
        histogram!(
            "estimation_price_lookup_duration_seconds",
            "outcome" => outcome.to_string()
        )
        .record(duration.as_secs_f64());
    }

    pub fn record_cache_hit() {
        counter!("estimation_price_cache_hits_total").increment(1);
    }

    pub fn record_retry() {
        counter!("estimation_price_lookup_retries_total").increment(1);
    }

    /// Record the end of an estimation run
    pub fn record_run(status: &str, duration: Duration, components: usize) {
        counter!("estimation_runs_total", "status" => status.to_string()).increment(1);
        histogram!("estimation_run_duration_seconds", "status" => status.to_string())
            .record(duration.as_secs_f64());
        gauge!("estimation_components_last_run").set(components as f64);

        tracing::debug!(
            status = status,
            components = components,
            duration_ms = duration.as_millis() as u64,
            "Estimation run recorded"
        );
    }
}
