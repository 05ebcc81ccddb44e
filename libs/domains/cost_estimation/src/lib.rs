//! Cost Estimation Domain
//!
//! Estimates the monthly cost of infrastructure resources before they are
//! provisioned, from a parsed resource graph and optional usage estimates.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  ResourceGraph   │  ← Parsed resources, `{"$ref": ...}` edges
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐     ┌──────────────────┐
//! │     Builders     │ ←── │ ReferenceResolver│  ← Cross-resource attributes
//! └────────┬─────────┘     └──────────────────┘
//!          │ CostComponent + PriceSpec
//! ┌────────▼─────────┐     ┌──────────────────┐
//! │   PriceMatcher   │ ──> │  PricingCatalog  │  ← Trait; HTTP client provided
//! └────────┬─────────┘     └──────────────────┘
//!          │
//! ┌────────▼─────────┐     ┌──────────────────┐
//! │  CostCalculator  │ ←── │  UsageResolver   │  ← Overrides + schema defaults
//! └────────┬─────────┘     └──────────────────┘
//!          │
//! ┌────────▼─────────┐
//! │    Aggregator    │  ← Post-order totals
//! └──────────────────┘
//! ```

pub mod aggregator;
pub mod breakdown;
pub mod builders;
pub mod calculator;
pub mod catalog;
pub mod catalog_client;
pub mod error;
pub mod estimator;
pub mod matcher;
pub mod models;
pub mod price_spec;
pub mod references;
pub mod usage;

// Re-export commonly used types
pub use aggregator::Aggregator;
pub use breakdown::{ComponentStatus, CostBreakdown, CostComponentResult, ResourceBreakdown};
pub use builders::{default_registry, BuilderRegistry, CostComponent, ResourceKind, TimeBasis};
pub use calculator::{CostCalculator, HOURS_PER_MONTH};
pub use catalog::{CatalogError, CatalogPrice, CatalogQuery, CatalogResult, PricingCatalog};
pub use catalog_client::HttpPricingCatalog;
pub use error::{Diagnostic, EstimationError, EstimationResult};
pub use estimator::{CostEstimator, EstimatorOptions};
pub use matcher::{MatchOutcome, PriceMatcher, RetryPolicy};
pub use models::{AttributeValue, Resource, ResourceGraph};
pub use price_spec::{PriceHash, PriceSpec};
pub use references::{ReferenceResolver, Resolution};
pub use usage::{UsageKey, UsageOverrides, UsageResolver, UsageSchema};
