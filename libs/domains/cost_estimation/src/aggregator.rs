//! Aggregator
//!
//! Post-order roll-up of component costs into resource totals. Totals are
//! recomputed from the components on every call, so aggregating an already
//! aggregated tree changes nothing.
//!
//! A total that leaves the decimal range is reported as null with a
//! [`Diagnostic::TotalOverflow`], and every enclosing total is null too.

use rust_decimal::Decimal;
use tracing::warn;

use crate::breakdown::{CostBreakdown, ResourceBreakdown};
use crate::error::Diagnostic;

/// Running sum that stays `None` until a value is seen.
#[derive(Debug, Clone, Copy, Default)]
struct Total {
    value: Option<Decimal>,
    overflowed: bool,
}

impl Total {
    fn add(&mut self, value: Option<Decimal>) {
        let (Some(v), false) = (value, self.overflowed) else {
            return;
        };
        match self.value {
            None => self.value = Some(v),
            Some(t) => match t.checked_add(v) {
                Some(sum) => self.value = Some(sum),
                None => self.poison(),
            },
        }
    }

    fn poison(&mut self) {
        self.value = None;
        self.overflowed = true;
    }
}

pub struct Aggregator;

impl Aggregator {
    /// Fill in `hourly_total` and `total` for `node` and its subtree.
    pub fn aggregate(node: &mut ResourceBreakdown) {
        Self::roll_up(node);
    }

    /// Returns whether `node`'s totals overflowed.
    fn roll_up(node: &mut ResourceBreakdown) -> bool {
        let mut hourly = Total::default();
        let mut monthly = Total::default();

        for child in &mut node.children {
            if Self::roll_up(child) {
                hourly.poison();
                monthly.poison();
            } else {
                hourly.add(child.hourly_total);
                monthly.add(child.total);
            }
        }
        for component in &node.cost_components {
            hourly.add(component.hourly_cost);
            monthly.add(component.monthly_cost);
        }

        let overflowed = hourly.overflowed || monthly.overflowed;
        node.diagnostics.retain(|d| !matches!(d, Diagnostic::TotalOverflow { .. }));
        if overflowed {
            warn!(resource = %node.resource_address, "Resource total overflowed");
            node.diagnostics.push(Diagnostic::TotalOverflow {
                address: node.resource_address.clone(),
            });
        }
        if overflowed {
            node.hourly_total = None;
            node.total = None;
        } else {
            node.hourly_total = hourly.value;
            node.total = monthly.value;
        }
        overflowed
    }

    /// Aggregate every resource and the run-level totals.
    pub fn aggregate_all(breakdown: &mut CostBreakdown) {
        let mut hourly = Total::default();
        let mut monthly = Total::default();
        for resource in &mut breakdown.resources {
            if Self::roll_up(resource) {
                hourly.poison();
                monthly.poison();
            } else {
                hourly.add(resource.hourly_total);
                monthly.add(resource.total);
            }
        }

        breakdown
            .diagnostics
            .retain(|d| !matches!(d, Diagnostic::TotalOverflow { .. }));
        if hourly.overflowed || monthly.overflowed {
            warn!("Estimation total overflowed");
            breakdown.diagnostics.push(Diagnostic::TotalOverflow {
                address: "total".to_string(),
            });
            breakdown.hourly_total = None;
            breakdown.total = None;
        } else {
            breakdown.hourly_total = hourly.value;
            breakdown.total = monthly.value;
        }
    }
}
