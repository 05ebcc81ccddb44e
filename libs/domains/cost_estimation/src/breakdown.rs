//! Estimation output.
//!
//! Every monetary field is optional. A `None` always comes with a
//! [`ComponentStatus`] saying why, so partial results are never mistaken for
//! zero-cost ones.

use rust_decimal::Decimal;
use serde::Serialize;
use strum::{Display, EnumString};

use crate::builders::TimeBasis;
use crate::error::Diagnostic;
use crate::price_spec::PriceHash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ComponentStatus {
    /// Price and quantity both resolved
    Priced,
    /// The catalog has no matching price
    Unpriced,
    /// Usage-based with nothing supplied and no default
    NoUsage,
    /// A usage override for the resource was rejected
    UsageUnresolved,
    /// The catalog kept failing after retries
    LookupFailed,
    /// The catalog quoted a different currency than the run's
    CurrencyMismatch,
    /// The cost is too large to represent
    Overflow,
}

/// A priced (or explicitly unpriced) cost component.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostComponentResult {
    pub name: String,
    pub unit: String,
    #[serde(skip)]
    pub unit_multiplier: Decimal,
    pub time_basis: TimeBasis,
    pub price_hash: PriceHash,
    /// Catalog unit price
    pub price: Option<Decimal>,
    /// Billed quantity per the time basis (per hour or per month)
    pub quantity: Option<Decimal>,
    pub hourly_cost: Option<Decimal>,
    pub monthly_cost: Option<Decimal>,
    pub status: ComponentStatus,
    /// Set when the quantity rests on an assumed default
    pub estimated: bool,
}

impl CostComponentResult {
    /// Quantity in display units, e.g. 1 500 000 requests -> 1.5 "1M requests".
    pub fn display_quantity(&self) -> Option<Decimal> {
        self.quantity.map(|q| (q / self.unit_multiplier).normalize())
    }

    /// Price per display unit.
    pub fn display_price(&self) -> Option<Decimal> {
        self.price
            .and_then(|p| p.checked_mul(self.unit_multiplier))
            .map(|p| p.normalize())
    }

    pub fn is_priced(&self) -> bool {
        self.status == ComponentStatus::Priced
    }
}

/// Breakdown node for one resource (or sub-resource).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceBreakdown {
    pub resource_address: String,
    pub resource_type: String,
    pub cost_components: Vec<CostComponentResult>,
    pub children: Vec<ResourceBreakdown>,
    pub hourly_total: Option<Decimal>,
    /// Monthly total including children
    pub total: Option<Decimal>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl ResourceBreakdown {
    pub fn new(address: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            resource_address: address.into(),
            resource_type: resource_type.into(),
            cost_components: Vec::new(),
            children: Vec::new(),
            hourly_total: None,
            total: None,
            diagnostics: Vec::new(),
        }
    }

    /// True when any component in this subtree rests on an assumption or
    /// lacks a price, or a total could not be represented.
    pub fn is_partial(&self) -> bool {
        self.cost_components
            .iter()
            .any(|c| c.estimated || !c.is_priced())
            || self
                .diagnostics
                .iter()
                .any(|d| matches!(d, Diagnostic::TotalOverflow { .. }))
            || self.children.iter().any(ResourceBreakdown::is_partial)
    }

    /// Depth-first search by address.
    pub fn find(&self, address: &str) -> Option<&ResourceBreakdown> {
        if self.resource_address == address {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(address))
    }

    pub fn component(&self, name: &str) -> Option<&CostComponentResult> {
        self.cost_components.iter().find(|c| c.name == name)
    }
}

/// Result of a full estimation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub currency: String,
    pub resources: Vec<ResourceBreakdown>,
    pub hourly_total: Option<Decimal>,
    pub total: Option<Decimal>,
    /// Resources with no registered builder
    pub unsupported: Vec<Diagnostic>,
    /// Run-level issues, such as a grand total that overflowed
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl CostBreakdown {
    pub fn find(&self, address: &str) -> Option<&ResourceBreakdown> {
        self.resources.iter().find_map(|r| r.find(address))
    }

    pub fn is_partial(&self) -> bool {
        !self.diagnostics.is_empty() || self.resources.iter().any(ResourceBreakdown::is_partial)
    }
}
