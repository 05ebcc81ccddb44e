use serde::Serialize;
use thiserror::Error;

/// Result type for estimation runs
pub type EstimationResult<T> = Result<T, EstimationError>;

/// Errors that abort an estimation run.
///
/// Everything recoverable is reported as a [`Diagnostic`] on the breakdown
/// instead.
#[derive(Debug, Error)]
pub enum EstimationError {
    /// The pricing catalog rejected our credentials
    #[error("Pricing catalog authentication failed: {0}")]
    CatalogAuth(String),

    /// Malformed resource graph or usage document
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Non-fatal issue collected while estimating a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A cross-resource attribute could not be resolved; a default was used.
    UnresolvedReference {
        edge: String,
        attribute: String,
        assumed: String,
        reason: String,
    },
    /// A usage override had the wrong type or shape.
    InvalidUsageValue { key: String, reason: String },
    /// A usage override had no matching schema entry.
    UnknownUsageKey { key: String },
    /// No catalog entry matched the component's filters.
    PriceNotFound { component: String, price_hash: String },
    /// The catalog kept failing after retries.
    TransientCatalogError { component: String, reason: String },
    /// No builder is registered for the resource's type.
    UnsupportedResource { address: String, resource_type: String },
    /// The catalog price is in another currency; it is never converted.
    CurrencyMismatch {
        component: String,
        expected: String,
        actual: String,
    },
    /// Price times quantity exceeds the decimal range.
    CostOverflow { component: String },
    /// A resource or run total exceeds the decimal range.
    TotalOverflow { address: String },
}

impl Diagnostic {
    /// Warnings do not affect any computed figure.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Diagnostic::UnknownUsageKey { .. } | Diagnostic::UnsupportedResource { .. }
        )
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::UnresolvedReference {
                edge,
                attribute,
                assumed,
                reason,
            } => write!(
                f,
                "could not resolve {edge}.{attribute} ({reason}), assuming {assumed}"
            ),
            Diagnostic::InvalidUsageValue { key, reason } => {
                write!(f, "invalid usage value for '{key}': {reason}")
            }
            Diagnostic::UnknownUsageKey { key } => write!(f, "unknown usage key '{key}'"),
            Diagnostic::PriceNotFound {
                component,
                price_hash,
            } => write!(f, "no price found for '{component}' ({price_hash})"),
            Diagnostic::TransientCatalogError { component, reason } => {
                write!(f, "price lookup for '{component}' failed: {reason}")
            }
            Diagnostic::UnsupportedResource {
                address,
                resource_type,
            } => write!(f, "{address}: resource type '{resource_type}' is not supported"),
            Diagnostic::CurrencyMismatch {
                component,
                expected,
                actual,
            } => write!(
                f,
                "price for '{component}' is quoted in {actual}, expected {expected}"
            ),
            Diagnostic::CostOverflow { component } => {
                write!(f, "cost of '{component}' is too large to represent")
            }
            Diagnostic::TotalOverflow { address } => {
                write!(f, "total for {address} is too large to represent")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_serializes_with_kind_tag() {
        let diagnostic = Diagnostic::UnknownUsageKey {
            key: "monthly_foo".to_string(),
        };
        let json = serde_json::to_value(&diagnostic).unwrap();
        assert_eq!(json["kind"], "unknown_usage_key");
        assert_eq!(json["key"], "monthly_foo");
        assert!(diagnostic.is_warning());
    }

    #[test]
    fn test_diagnostic_display() {
        let diagnostic = Diagnostic::UnresolvedReference {
            edge: "volume_id".to_string(),
            attribute: "size".to_string(),
            assumed: "8".to_string(),
            reason: "target not in graph".to_string(),
        };
        assert_eq!(
            diagnostic.to_string(),
            "could not resolve volume_id.size (target not in graph), assuming 8"
        );
    }
}
