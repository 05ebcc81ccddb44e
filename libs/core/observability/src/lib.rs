//! Observability utilities for the cost estimator.
//!
//! This crate provides:
//! - Prometheus metrics recording and text export
//! - Estimation metrics for catalog lookups, retries and runs
//!
//! # Example
//!
//! ```rust,ignore
//! use observability::{init_metrics, render_metrics, EstimationMetrics};
//!
//! init_metrics()?;
//!
//! EstimationMetrics::record_cache_hit();
//!
//! eprintln!("{}", render_metrics());
//! ```

pub mod estimation;

pub use estimation::EstimationMetrics;

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize the Prometheus metrics recorder.
///
/// Installs the global recorder on first call; later calls return the same handle.
pub fn init_metrics() -> Result<&'static PrometheusHandle, BuildError> {
    METRICS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new().install_recorder()?;

        info!("Prometheus metrics recorder initialized");
        register_metric_descriptions();

        Ok(handle)
    })
}

/// Get the metrics handle (must call init_metrics first)
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Render all recorded metrics in the Prometheus text format
pub fn render_metrics() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

fn register_metric_descriptions() {
    use metrics::describe_counter;
    use metrics::describe_gauge;
    use metrics::describe_histogram;

    describe_counter!(
        "estimation_price_lookups_total",
        "Catalog price lookups by outcome"
    );
    describe_histogram!(
        "estimation_price_lookup_duration_seconds",
        "Catalog price lookup duration including retries"
    );
    describe_counter!(
        "estimation_price_cache_hits_total",
        "Price lookups answered from the in-run cache"
    );
    describe_counter!(
        "estimation_price_lookup_retries_total",
        "Catalog queries retried after a transient failure"
    );
    describe_counter!("estimation_runs_total", "Estimation runs by status");
    describe_histogram!(
        "estimation_run_duration_seconds",
        "Estimation run duration in seconds"
    );
    describe_gauge!(
        "estimation_components_last_run",
        "Cost components produced by the most recent run"
    );
}
