//! Cost Calculator
//!
//! Turns a cost component, its price lookup outcome and the resource's
//! resolved usage into hourly and monthly costs.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::breakdown::{ComponentStatus, CostComponentResult};
use crate::builders::{CostComponent, Quantity, TimeBasis};
use crate::error::Diagnostic;
use crate::matcher::MatchOutcome;
use crate::usage::ResolvedUsage;

/// Hours in an average month (365 * 24 / 12).
pub const HOURS_PER_MONTH: Decimal = dec!(730);

/// A computed component plus the diagnostic explaining a missing figure.
#[derive(Debug, Clone, PartialEq)]
pub struct Computation {
    pub result: CostComponentResult,
    pub diagnostic: Option<Diagnostic>,
}

enum QuantityState {
    Known(Decimal),
    Unset,
    Invalid,
    Overflow,
}

pub struct CostCalculator;

impl CostCalculator {
    /// Cost `component` in `currency`.
    ///
    /// A catalog price quoted in any other currency is not converted; the
    /// component is left uncosted with a [`Diagnostic::CurrencyMismatch`].
    pub fn compute(
        component: &CostComponent,
        outcome: &MatchOutcome,
        usage: &ResolvedUsage,
        currency: &str,
    ) -> Computation {
        let price_hash = component.price_spec.hash();
        let quantity = Self::quantity(component, usage);
        let price = match outcome {
            MatchOutcome::Found(found) if found.currency.eq_ignore_ascii_case(currency) => {
                Some(found.unit_price)
            }
            _ => None,
        };

        let mut result = CostComponentResult {
            name: component.name.clone(),
            unit: component.unit.clone(),
            unit_multiplier: component.unit_multiplier,
            time_basis: component.time_basis,
            price_hash: price_hash.clone(),
            price,
            quantity: None,
            hourly_cost: None,
            monthly_cost: None,
            status: ComponentStatus::Priced,
            estimated: component.assumption.is_some(),
        };

        let quantity = match quantity {
            QuantityState::Known(q) => q,
            QuantityState::Unset => {
                result.status = ComponentStatus::NoUsage;
                return Computation {
                    result,
                    diagnostic: None,
                };
            }
            QuantityState::Invalid => {
                result.status = ComponentStatus::UsageUnresolved;
                return Computation {
                    result,
                    diagnostic: None,
                };
            }
            QuantityState::Overflow => return Self::overflowed(component, result),
        };
        result.quantity = Some(quantity);

        let price = match outcome {
            MatchOutcome::Found(found) if !found.currency.eq_ignore_ascii_case(currency) => {
                result.status = ComponentStatus::CurrencyMismatch;
                let diagnostic = Diagnostic::CurrencyMismatch {
                    component: component.name.clone(),
                    expected: currency.to_string(),
                    actual: found.currency.clone(),
                };
                return Computation {
                    result,
                    diagnostic: Some(diagnostic),
                };
            }
            MatchOutcome::Found(found) => found.unit_price,
            MatchOutcome::NotFound => {
                result.status = ComponentStatus::Unpriced;
                let diagnostic = Diagnostic::PriceNotFound {
                    component: component.name.clone(),
                    price_hash: price_hash.to_string(),
                };
                return Computation {
                    result,
                    diagnostic: Some(diagnostic),
                };
            }
            MatchOutcome::Failed(reason) => {
                result.status = ComponentStatus::LookupFailed;
                let diagnostic = Diagnostic::TransientCatalogError {
                    component: component.name.clone(),
                    reason: reason.clone(),
                };
                return Computation {
                    result,
                    diagnostic: Some(diagnostic),
                };
            }
        };

        let costs = match component.time_basis {
            TimeBasis::Hourly => price
                .checked_mul(quantity)
                .and_then(|hourly| Some((hourly, hourly.checked_mul(HOURS_PER_MONTH)?))),
            TimeBasis::Monthly | TimeBasis::UsageBased => price
                .checked_mul(quantity)
                .map(|monthly| (monthly / HOURS_PER_MONTH, monthly)),
        };
        let Some((hourly, monthly)) = costs else {
            return Self::overflowed(component, result);
        };
        result.hourly_cost = Some(hourly);
        result.monthly_cost = Some(monthly);

        Computation {
            result,
            diagnostic: None,
        }
    }

    fn overflowed(component: &CostComponent, mut result: CostComponentResult) -> Computation {
        result.status = ComponentStatus::Overflow;
        Computation {
            result,
            diagnostic: Some(Diagnostic::CostOverflow {
                component: component.name.clone(),
            }),
        }
    }

    fn quantity(component: &CostComponent, usage: &ResolvedUsage) -> QuantityState {
        match &component.quantity {
            Quantity::Fixed(q) => QuantityState::Known(*q),
            Quantity::Usage { .. } if usage.has_invalid_values() => QuantityState::Invalid,
            Quantity::Usage { key, scale } => match usage.get(key) {
                Some(value) if !value.is_unset() => match value.value {
                    Some(v) => v
                        .checked_mul(*scale)
                        .map_or(QuantityState::Overflow, QuantityState::Known),
                    None => QuantityState::Unset,
                },
                _ => QuantityState::Unset,
            },
        }
    }
}
