use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use crate::price_spec::PriceSpec;

/// Result type for pricing catalog queries
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors reported by a pricing catalog
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// Credentials rejected; no further query can succeed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    /// Network failure or server-side error
    #[error("Transient catalog error: {0}")]
    Transient(String),

    /// The catalog answered with something we could not interpret
    #[error("Invalid catalog response: {0}")]
    InvalidResponse(String),
}

impl CatalogError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, CatalogError::Unauthorized(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CatalogError::RateLimited { .. } | CatalogError::Timeout(_) | CatalogError::Transient(_)
        )
    }
}

/// Query sent to the pricing catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogQuery {
    pub service: String,
    pub product_family: String,
    pub product_attributes: BTreeMap<String, String>,
    pub price_attributes: BTreeMap<String, String>,
}

impl From<&PriceSpec> for CatalogQuery {
    fn from(spec: &PriceSpec) -> Self {
        Self {
            service: spec.product.service.clone(),
            product_family: spec.product.product_family.clone(),
            product_attributes: spec.product.attributes.clone(),
            price_attributes: spec.price.attributes.clone(),
        }
    }
}

/// A matched catalog price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPrice {
    pub unit_price: Decimal,
    pub currency: String,
    pub unit: String,
}

/// External pricing catalog.
///
/// `Ok(None)` means no SKU matched the filters, which is a valid answer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PricingCatalog: Send + Sync {
    async fn query(&self, query: &CatalogQuery) -> CatalogResult<Option<CatalogPrice>>;
}
