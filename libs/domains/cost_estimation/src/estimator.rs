//! Cost Estimator
//!
//! Runs one estimation over a resource graph:
//!
//! ```text
//! ┌────────┐   ┌────────────┐   ┌──────────────┐   ┌────────────┐   ┌────────────┐
//! │  plan  │──>│  lookups   │──>│  calculate   │──>│ aggregate  │──>│ breakdown  │
//! └────────┘   └────────────┘   └──────────────┘   └────────────┘   └────────────┘
//!  builders,    unique price     per component      post-order
//!  references,  hashes, bounded  cost + status      totals
//!  usage        concurrency
//! ```
//!
//! Every phase except the lookups is synchronous. A fatal catalog error stops
//! the lookup stream, which drops the outstanding lookups, and the run
//! returns no breakdown.

use futures::{stream, StreamExt, TryStreamExt};
use observability::EstimationMetrics;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;
use tracing::{debug, error, info, instrument};

use crate::aggregator::Aggregator;
use crate::breakdown::{CostBreakdown, ResourceBreakdown};
use crate::builders::{default_registry, BuildContext, BuilderRegistry, CostComponent};
use crate::calculator::CostCalculator;
use crate::error::{Diagnostic, EstimationError, EstimationResult};
use crate::matcher::{MatchOutcome, PriceMatcher};
use crate::models::{Resource, ResourceGraph};
use crate::price_spec::{PriceHash, PriceSpec};
use crate::references::ReferenceResolver;
use crate::usage::{ResolvedUsage, UsageOverrides, UsageResolver};

/// Run-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstimatorOptions {
    /// Region for resources that carry neither `region` nor `availability_zone`
    pub default_region: String,
    pub currency: String,
    /// Upper bound on concurrent catalog lookups
    pub max_concurrency: usize,
}

impl Default for EstimatorOptions {
    fn default() -> Self {
        Self {
            default_region: "us-east-1".to_string(),
            currency: "USD".to_string(),
            max_concurrency: 8,
        }
    }
}

/// A resource with its components built and usage resolved, awaiting prices.
struct PlannedResource {
    address: String,
    resource_type: String,
    components: Vec<CostComponent>,
    usage: ResolvedUsage,
    diagnostics: Vec<Diagnostic>,
    children: Vec<PlannedResource>,
}

impl PlannedResource {
    fn price_specs<'a>(&'a self, specs: &mut BTreeMap<PriceHash, &'a PriceSpec>) {
        for component in &self.components {
            specs.entry(component.price_spec.hash()).or_insert(&component.price_spec);
        }
        for child in &self.children {
            child.price_specs(specs);
        }
    }

    fn component_count(&self) -> usize {
        self.components.len() + self.children.iter().map(Self::component_count).sum::<usize>()
    }
}

pub struct CostEstimator {
    matcher: PriceMatcher,
    registry: &'static BuilderRegistry,
    options: EstimatorOptions,
}

impl CostEstimator {
    pub fn new(matcher: PriceMatcher) -> Self {
        Self {
            matcher,
            registry: default_registry(),
            options: EstimatorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EstimatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Estimate every resource in `graph`.
    #[instrument(skip_all, fields(resources = graph.len()))]
    pub async fn estimate(
        &self,
        graph: &ResourceGraph,
        overrides: &UsageOverrides,
    ) -> EstimationResult<CostBreakdown> {
        let started = Instant::now();

        for address in overrides.addresses().filter(|a| graph.get(a).is_none()) {
            debug!(resource = address, "Ignoring usage for resource not in graph");
        }

        let usage = UsageResolver::new(overrides);
        let references = ReferenceResolver::new(graph);
        let mut unsupported = Vec::new();
        let plans: Vec<PlannedResource> = graph
            .roots()
            .into_iter()
            .filter_map(|resource| self.plan(resource, references, &usage, &mut unsupported))
            .collect();

        let mut specs = BTreeMap::new();
        for plan in &plans {
            plan.price_specs(&mut specs);
        }
        let component_count: usize = plans.iter().map(PlannedResource::component_count).sum();
        debug!(
            components = component_count,
            unique_prices = specs.len(),
            "Planned estimation"
        );

        let outcomes = match self.lookup_all(specs).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                error!(error = %e, "Estimation aborted");
                EstimationMetrics::record_run("failed", started.elapsed(), component_count);
                return Err(e);
            }
        };

        let mut breakdown = CostBreakdown {
            currency: self.options.currency.clone(),
            resources: plans
                .into_iter()
                .map(|plan| Self::calculate(plan, &outcomes, &self.options.currency))
                .collect(),
            hourly_total: None,
            total: None,
            unsupported,
            diagnostics: Vec::new(),
        };
        Aggregator::aggregate_all(&mut breakdown);

        EstimationMetrics::record_run("completed", started.elapsed(), component_count);
        info!(
            resources = breakdown.resources.len(),
            unsupported = breakdown.unsupported.len(),
            monthly_total = ?breakdown.total,
            partial = breakdown.is_partial(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Estimation completed"
        );

        Ok(breakdown)
    }

    fn plan(
        &self,
        resource: &Resource,
        references: ReferenceResolver<'_>,
        usage: &UsageResolver<'_>,
        unsupported: &mut Vec<Diagnostic>,
    ) -> Option<PlannedResource> {
        let mut children: Vec<PlannedResource> = Vec::new();
        let mut graph_children: Vec<&Resource> = resource.children.iter().collect();
        graph_children.sort_by(|a, b| a.address.cmp(&b.address));

        let Some(kind) = self.registry.get(&resource.resource_type) else {
            debug!(
                resource = %resource.address,
                resource_type = %resource.resource_type,
                "Unsupported resource type"
            );
            unsupported.push(Diagnostic::UnsupportedResource {
                address: resource.address.clone(),
                resource_type: resource.resource_type.clone(),
            });
            children.extend(
                graph_children
                    .into_iter()
                    .filter_map(|child| self.plan(child, references, usage, unsupported)),
            );
            if children.is_empty() {
                return None;
            }
            return Some(PlannedResource {
                address: resource.address.clone(),
                resource_type: resource.resource_type.clone(),
                components: Vec::new(),
                usage: ResolvedUsage::default(),
                diagnostics: Vec::new(),
                children,
            });
        };

        let ctx = BuildContext::new(
            resource,
            references,
            &kind.usage_schema,
            &self.options.default_region,
        );
        let output = (kind.build)(&ctx);
        let resolved = usage.resolve(&resource.address, &kind.usage_schema);

        let mut diagnostics = resolved.diagnostics.clone();
        diagnostics.extend(output.components.iter().filter_map(|c| c.assumption.clone()));

        for sub in output.sub_resources {
            children.push(PlannedResource {
                address: format!("{}.{}", resource.address, sub.name),
                resource_type: sub.resource_type,
                diagnostics: sub.components.iter().filter_map(|c| c.assumption.clone()).collect(),
                components: sub.components,
                usage: ResolvedUsage::default(),
                children: Vec::new(),
            });
        }
        children.extend(
            graph_children
                .into_iter()
                .filter_map(|child| self.plan(child, references, usage, unsupported)),
        );

        Some(PlannedResource {
            address: resource.address.clone(),
            resource_type: resource.resource_type.clone(),
            components: output.components,
            usage: resolved,
            diagnostics,
            children,
        })
    }

    async fn lookup_all(
        &self,
        specs: BTreeMap<PriceHash, &PriceSpec>,
    ) -> EstimationResult<HashMap<PriceHash, MatchOutcome>> {
        stream::iter(specs)
            .map(|(hash, spec)| async move {
                let outcome = self.matcher.match_price(spec).await?;
                Ok::<_, EstimationError>((hash, outcome))
            })
            .buffer_unordered(self.options.max_concurrency.max(1))
            .try_collect()
            .await
    }

    fn calculate(
        plan: PlannedResource,
        outcomes: &HashMap<PriceHash, MatchOutcome>,
        currency: &str,
    ) -> ResourceBreakdown {
        let mut node = ResourceBreakdown::new(plan.address, plan.resource_type);
        node.diagnostics = plan.diagnostics;

        for component in &plan.components {
            let outcome = outcomes
                .get(&component.price_spec.hash())
                .cloned()
                .unwrap_or_else(|| MatchOutcome::Failed("price was not looked up".to_string()));
            let computation =
                CostCalculator::compute(component, &outcome, &plan.usage, currency);
            node.diagnostics.extend(computation.diagnostic);
            node.cost_components.push(computation.result);
        }

        node.children = plan
            .children
            .into_iter()
            .map(|child| Self::calculate(child, outcomes, currency))
            .collect();
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breakdown::ComponentStatus;
    use crate::catalog::{
        CatalogError, CatalogPrice, CatalogQuery, CatalogResult, MockPricingCatalog,
        PricingCatalog,
    };
    use crate::models::AttributeValue;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn estimator(catalog: MockPricingCatalog) -> CostEstimator {
        CostEstimator::new(PriceMatcher::new(Arc::new(catalog)))
    }

    fn flat_price() -> CatalogPrice {
        CatalogPrice {
            unit_price: dec!(0.1),
            currency: "USD".into(),
            unit: "GB-Mo".into(),
        }
    }

    #[tokio::test]
    async fn test_identical_specs_are_looked_up_once() {
        let graph = ResourceGraph::new(vec![
            Resource::new("aws_ebs_volume.a", "aws_ebs_volume").with_attribute("size", 10),
            Resource::new("aws_ebs_volume.b", "aws_ebs_volume").with_attribute("size", 20),
        ])
        .unwrap();
        let mut catalog = MockPricingCatalog::new();
        catalog.expect_query().times(1).returning(|_| Ok(Some(flat_price())));

        let breakdown = estimator(catalog)
            .estimate(&graph, &UsageOverrides::new())
            .await
            .unwrap();

        assert_eq!(breakdown.find("aws_ebs_volume.a").unwrap().total, Some(dec!(1.0)));
        assert_eq!(breakdown.find("aws_ebs_volume.b").unwrap().total, Some(dec!(2.0)));
        assert_eq!(breakdown.total, Some(dec!(3.0)));
    }

    #[tokio::test]
    async fn test_unsupported_resources_are_listed() {
        let graph = ResourceGraph::new(vec![
            Resource::new("aws_s3_bucket.logs", "aws_s3_bucket"),
            Resource::new("aws_ebs_volume.a", "aws_ebs_volume"),
        ])
        .unwrap();
        let mut catalog = MockPricingCatalog::new();
        catalog.expect_query().returning(|_| Ok(Some(flat_price())));

        let breakdown = estimator(catalog)
            .estimate(&graph, &UsageOverrides::new())
            .await
            .unwrap();

        assert_eq!(breakdown.resources.len(), 1);
        assert_eq!(
            breakdown.unsupported,
            vec![Diagnostic::UnsupportedResource {
                address: "aws_s3_bucket.logs".into(),
                resource_type: "aws_s3_bucket".into(),
            }]
        );
    }

    #[tokio::test]
    async fn test_children_roll_up() {
        let volume = Resource::new("aws_ebs_volume.a", "aws_ebs_volume")
            .with_attribute("size", 10)
            .with_child(
                Resource::new("aws_ebs_snapshot.a", "aws_ebs_snapshot")
                    .with_attribute("volume_id", AttributeValue::reference("aws_ebs_volume.a")),
            );
        let graph = ResourceGraph::new(vec![volume]).unwrap();
        let mut catalog = MockPricingCatalog::new();
        catalog.expect_query().returning(|query| {
            Ok(match query.product_family.as_str() {
                "Storage" | "Storage Snapshot" => Some(flat_price()),
                _ => None,
            })
        });

        let breakdown = estimator(catalog)
            .estimate(&graph, &UsageOverrides::new())
            .await
            .unwrap();

        let volume = breakdown.find("aws_ebs_volume.a").unwrap();
        let snapshot = breakdown.find("aws_ebs_snapshot.a").unwrap();
        assert_eq!(snapshot.total, Some(dec!(1.0)));
        assert_eq!(volume.total, Some(dec!(2.0)));
        assert_eq!(
            snapshot.component("Fast snapshot restore").unwrap().status,
            ComponentStatus::Unpriced
        );
        assert!(
            snapshot
                .diagnostics
                .iter()
                .any(|d| matches!(d, Diagnostic::PriceNotFound { .. }))
        );
    }

    #[tokio::test]
    async fn test_instance_block_devices_become_children() {
        let graph = ResourceGraph::new(vec![
            Resource::new("aws_instance.web", "aws_instance")
                .with_attribute("instance_type", "m5.large"),
        ])
        .unwrap();
        let mut catalog = MockPricingCatalog::new();
        catalog.expect_query().returning(|_| Ok(Some(flat_price())));

        let breakdown = estimator(catalog)
            .estimate(&graph, &UsageOverrides::new())
            .await
            .unwrap();

        let instance = breakdown.find("aws_instance.web").unwrap();
        assert_eq!(instance.children.len(), 1);
        assert_eq!(instance.children[0].resource_address, "aws_instance.web.root_block_device");
        // 0.1 * 730 hours + 8 GB * 0.1
        assert_eq!(instance.total, Some(dec!(73.8)));
    }

    #[tokio::test]
    async fn test_fatal_error_returns_no_breakdown() {
        let graph = ResourceGraph::new(vec![
            Resource::new("aws_ebs_volume.a", "aws_ebs_volume"),
            Resource::new("aws_nat_gateway.a", "aws_nat_gateway"),
        ])
        .unwrap();
        let mut catalog = MockPricingCatalog::new();
        catalog.expect_query().returning(|query| {
            if query.product_family == "NAT Gateway" {
                Err(CatalogError::Unauthorized("invalid api key".into()))
            } else {
                Ok(Some(flat_price()))
            }
        });

        let result = estimator(catalog)
            .estimate(&graph, &UsageOverrides::new())
            .await;

        assert!(matches!(result, Err(EstimationError::CatalogAuth(_))));
    }

    /// Records the highest number of queries in flight at once.
    #[derive(Default)]
    struct PeakCatalog {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        queries: AtomicUsize,
    }

    #[async_trait]
    impl PricingCatalog for PeakCatalog {
        async fn query(&self, _query: &CatalogQuery) -> CatalogResult<Option<CatalogPrice>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.queries.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Some(flat_price()))
        }
    }

    #[tokio::test]
    async fn test_lookups_respect_max_concurrency() {
        let regions = [
            "us-east-1",
            "us-east-2",
            "us-west-1",
            "us-west-2",
            "eu-west-1",
            "eu-west-2",
            "eu-central-1",
            "ap-south-1",
            "ap-northeast-1",
            "sa-east-1",
        ];
        let graph = ResourceGraph::new(
            regions
                .iter()
                .map(|region| {
                    Resource::new(format!("aws_ebs_volume.{region}"), "aws_ebs_volume")
                        .with_attribute("region", *region)
                })
                .collect(),
        )
        .unwrap();
        let catalog = Arc::new(PeakCatalog::default());
        let estimator = CostEstimator::new(PriceMatcher::new(catalog.clone())).with_options(
            EstimatorOptions {
                max_concurrency: 2,
                ..EstimatorOptions::default()
            },
        );

        let breakdown = estimator.estimate(&graph, &UsageOverrides::new()).await.unwrap();

        assert_eq!(catalog.queries.load(Ordering::SeqCst), regions.len());
        assert_eq!(catalog.peak.load(Ordering::SeqCst), 2);
        assert_eq!(breakdown.resources.len(), regions.len());
    }

    #[tokio::test]
    async fn test_overflowing_usage_does_not_abort_the_run() {
        let graph = ResourceGraph::new(vec![
            Resource::new("aws_nat_gateway.a", "aws_nat_gateway"),
            Resource::new("aws_ebs_volume.a", "aws_ebs_volume").with_attribute("size", 10),
        ])
        .unwrap();
        let usage = UsageOverrides::new().with(
            "aws_nat_gateway.a",
            "monthly_data_processed_gb",
            json!(5e28),
        );
        let mut catalog = MockPricingCatalog::new();
        catalog.expect_query().returning(|_| {
            Ok(Some(CatalogPrice {
                unit_price: dec!(5),
                ..flat_price()
            }))
        });

        let breakdown = estimator(catalog).estimate(&graph, &usage).await.unwrap();

        let gateway = breakdown.find("aws_nat_gateway.a").unwrap();
        let data = gateway.component("Data processed").unwrap();
        assert_eq!(data.status, ComponentStatus::Overflow);
        assert_eq!(data.monthly_cost, None);
        assert!(gateway.diagnostics.iter().any(|d| matches!(d, Diagnostic::CostOverflow { .. })));
        // 5 * 730 hours for the gateway itself, 5 * 10 GB for the volume
        assert_eq!(gateway.total, Some(dec!(3650)));
        assert_eq!(breakdown.total, Some(dec!(3700)));
        assert!(breakdown.is_partial());
    }

    #[tokio::test]
    async fn test_prices_in_another_currency_are_not_summed() {
        let graph = ResourceGraph::new(vec![
            Resource::new("aws_ebs_volume.a", "aws_ebs_volume").with_attribute("size", 10),
        ])
        .unwrap();
        let mut catalog = MockPricingCatalog::new();
        catalog.expect_query().returning(|_| {
            Ok(Some(CatalogPrice {
                currency: "EUR".into(),
                ..flat_price()
            }))
        });

        let breakdown = estimator(catalog)
            .estimate(&graph, &UsageOverrides::new())
            .await
            .unwrap();

        let volume = breakdown.find("aws_ebs_volume.a").unwrap();
        assert_eq!(volume.cost_components[0].status, ComponentStatus::CurrencyMismatch);
        assert_eq!(volume.total, None);
        assert_eq!(breakdown.total, None);
        assert_eq!(breakdown.currency, "USD");
        assert!(matches!(
            volume.diagnostics.as_slice(),
            [Diagnostic::CurrencyMismatch { actual, .. }] if actual == "EUR"
        ));
        assert_eq!(volume.cost_components[0].price, None);
    }
}
