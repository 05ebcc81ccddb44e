//! Wires configuration, the HTTP catalog and the estimator together.

use crate::config::Config;
use domain_cost_estimation::{
    CostBreakdown, CostEstimator, HttpPricingCatalog, PriceMatcher, ResourceGraph, UsageOverrides,
};
use eyre::{Result, WrapErr};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub async fn load_graph(path: &Path) -> Result<ResourceGraph> {
    let json = tokio::fs::read_to_string(path)
        .await
        .wrap_err_with(|| format!("Failed to read resource graph {}", path.display()))?;
    ResourceGraph::from_json(&json).wrap_err("Invalid resource graph")
}

pub async fn load_usage(path: Option<&Path>) -> Result<UsageOverrides> {
    let Some(path) = path else {
        return Ok(UsageOverrides::new());
    };
    let json = tokio::fs::read_to_string(path)
        .await
        .wrap_err_with(|| format!("Failed to read usage file {}", path.display()))?;
    UsageOverrides::from_json(&json).wrap_err("Invalid usage file")
}

pub fn build_estimator(config: &Config) -> Result<CostEstimator> {
    let catalog = HttpPricingCatalog::new(
        &config.catalog.endpoint,
        &config.catalog.api_key,
        config.catalog.timeout,
    )
    .wrap_err("Failed to build pricing API client")?;

    let mut matcher = PriceMatcher::new(Arc::new(catalog))
        .with_retry_policy(config.retry_policy())
        .with_query_timeout(config.catalog.timeout);
    if let Some(per_second) = config.rate_limit() {
        matcher = matcher.with_rate_limit(per_second);
    }

    Ok(CostEstimator::new(matcher).with_options(config.estimator_options()))
}

pub async fn run(config: &Config, graph: &Path, usage: Option<&Path>) -> Result<CostBreakdown> {
    let graph = load_graph(graph).await?;
    let usage = load_usage(usage).await?;
    info!(
        endpoint = %config.catalog.endpoint,
        resources = graph.len(),
        "Estimating costs"
    );

    let estimator = build_estimator(config)?;
    let breakdown = estimator
        .estimate(&graph, &usage)
        .await
        .wrap_err("Estimation aborted")?;

    info!(
        total = ?breakdown.total,
        partial = breakdown.is_partial(),
        unsupported = breakdown.unsupported.len(),
        "Estimation complete"
    );
    Ok(breakdown)
}
