//! Per-resource-type cost component builders.
//!
//! Each supported resource type registers a pure [`BuildFn`] together with its
//! [`UsageSchema`]. The registry is a plain table keyed by resource type tag,
//! built once on first use.
//!
//! ```text
//! ┌──────────────┐   BuildContext    ┌─────────────┐
//! │   Resource   │ ────────────────> │   BuildFn   │ ──> BuildOutput
//! └──────────────┘  (+ references,   └─────────────┘     ├─ components
//!                     usage schema)                       └─ sub-resources
//! ```

pub mod aws;

use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use strum::{Display, EnumString};

use crate::error::Diagnostic;
use crate::models::Resource;
use crate::price_spec::PriceSpec;
use crate::references::ReferenceResolver;
use crate::usage::UsageSchema;

/// How a component's quantity relates to time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimeBasis {
    /// Quantity is per hour; the catalog price is hourly.
    Hourly,
    /// Quantity is per month; the catalog price is monthly.
    Monthly,
    /// Monthly quantity taken from usage estimates.
    UsageBased,
}

/// Quantity formula of a cost component.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    /// Already evaluated from attributes.
    Fixed(Decimal),
    /// `usage[key] * scale`, evaluated once usage is resolved.
    Usage { key: String, scale: Decimal },
}

/// One billable dimension of a resource, before pricing.
#[derive(Debug, Clone, PartialEq)]
pub struct CostComponent {
    pub name: String,
    pub unit: String,
    /// Display divisor: a quantity of 1000 requests shows as 1 "1k requests".
    pub unit_multiplier: Decimal,
    pub time_basis: TimeBasis,
    pub price_spec: PriceSpec,
    pub quantity: Quantity,
    /// Present when the quantity rests on a fallback default.
    pub assumption: Option<Diagnostic>,
}

impl CostComponent {
    pub fn hourly(name: impl Into<String>, unit: &str, spec: PriceSpec, quantity: Decimal) -> Self {
        Self {
            name: name.into(),
            unit: unit.to_string(),
            unit_multiplier: Decimal::ONE,
            time_basis: TimeBasis::Hourly,
            price_spec: spec,
            quantity: Quantity::Fixed(quantity),
            assumption: None,
        }
    }

    pub fn monthly(
        name: impl Into<String>,
        unit: &str,
        spec: PriceSpec,
        quantity: Decimal,
    ) -> Self {
        Self {
            time_basis: TimeBasis::Monthly,
            ..Self::hourly(name, unit, spec, quantity)
        }
    }

    pub fn usage(name: impl Into<String>, unit: &str, spec: PriceSpec, key: &str) -> Self {
        Self {
            time_basis: TimeBasis::UsageBased,
            quantity: Quantity::Usage {
                key: key.to_string(),
                scale: Decimal::ONE,
            },
            ..Self::hourly(name, unit, spec, Decimal::ZERO)
        }
    }

    pub fn with_unit_multiplier(mut self, multiplier: Decimal) -> Self {
        self.unit_multiplier = multiplier;
        self
    }

    pub fn with_assumption(mut self, assumption: Option<Diagnostic>) -> Self {
        self.assumption = assumption;
        self
    }

    pub fn is_usage_based(&self) -> bool {
        self.time_basis == TimeBasis::UsageBased
    }
}

/// A priced part of a resource that is displayed as its own child node
/// (e.g. an instance's root block device).
#[derive(Debug, Clone, PartialEq)]
pub struct SubResource {
    pub name: String,
    pub resource_type: String,
    pub components: Vec<CostComponent>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildOutput {
    pub components: Vec<CostComponent>,
    pub sub_resources: Vec<SubResource>,
}

impl BuildOutput {
    pub fn new(components: Vec<CostComponent>) -> Self {
        Self {
            components,
            sub_resources: Vec::new(),
        }
    }
}

/// Everything a builder may look at.
pub struct BuildContext<'a> {
    pub resource: &'a Resource,
    pub region: String,
    pub references: ReferenceResolver<'a>,
    pub usage_schema: &'a UsageSchema,
}

impl<'a> BuildContext<'a> {
    pub fn new(
        resource: &'a Resource,
        references: ReferenceResolver<'a>,
        usage_schema: &'a UsageSchema,
        default_region: &str,
    ) -> Self {
        Self {
            resource,
            region: resolve_region(resource, default_region),
            references,
            usage_schema,
        }
    }

    /// Usage-based component whose unit label comes from the usage schema.
    pub fn usage_component(&self, name: &str, spec: PriceSpec, key: &str) -> CostComponent {
        let unit = self
            .usage_schema
            .get(key)
            .map(|k| k.unit.as_str())
            .unwrap_or("units");
        CostComponent::usage(name, unit, spec, key)
    }
}

/// `region` attribute, else the availability zone without its zone letter,
/// else the configured default.
pub fn resolve_region(resource: &Resource, default_region: &str) -> String {
    if let Some(region) = resource.str_attr("region") {
        return region.to_string();
    }
    if let Some(zone) = resource.str_attr("availability_zone") {
        let region = zone.trim_end_matches(|c: char| c.is_ascii_alphabetic());
        if !region.is_empty() && region.len() < zone.len() {
            return region.to_string();
        }
    }
    default_region.to_string()
}

pub type BuildFn = fn(&BuildContext<'_>) -> BuildOutput;

/// A supported resource type.
pub struct ResourceKind {
    pub resource_type: &'static str,
    pub build: BuildFn,
    pub usage_schema: UsageSchema,
}

#[derive(Default)]
pub struct BuilderRegistry {
    kinds: HashMap<&'static str, ResourceKind>,
}

impl BuilderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        resource_type: &'static str,
        build: BuildFn,
        usage_schema: UsageSchema,
    ) {
        self.kinds.insert(
            resource_type,
            ResourceKind {
                resource_type,
                build,
                usage_schema,
            },
        );
    }

    pub fn get(&self, resource_type: &str) -> Option<&ResourceKind> {
        self.kinds.get(resource_type)
    }

    /// Supported resource types, sorted.
    pub fn kinds(&self) -> Vec<&ResourceKind> {
        let mut kinds: Vec<&ResourceKind> = self.kinds.values().collect();
        kinds.sort_by_key(|k| k.resource_type);
        kinds
    }
}

static DEFAULT_REGISTRY: Lazy<BuilderRegistry> = Lazy::new(|| {
    let mut registry = BuilderRegistry::new();
    aws::register(&mut registry);
    registry
});

/// Registry with every built-in resource type.
pub fn default_registry() -> &'static BuilderRegistry {
    &DEFAULT_REGISTRY
}
