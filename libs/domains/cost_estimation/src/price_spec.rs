//! Price specifications and their canonical hash.
//!
//! A [`PriceSpec`] describes which catalog entry prices a cost component. Its
//! [`PriceHash`] is the deterministic key used for caching, request
//! coalescing and test fixtures:
//!
//! ```text
//! sha256(canonical({service, productFamily, attributes}))
//!   + "-" +
//! sha256(canonical({attributes}))
//! ```
//!
//! Attribute maps are `BTreeMap`s, so the canonical form never depends on the
//! order in which a builder inserted its filters.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Which product a component is priced from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    pub service: String,
    pub product_family: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// Which price of that product applies (purchase option, term, unit...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PriceFilter {
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSpec {
    pub product: ProductFilter,
    #[serde(default)]
    pub price: PriceFilter,
}

impl PriceSpec {
    pub fn new(service: &str, product_family: &str) -> Self {
        Self {
            product: ProductFilter {
                service: service.to_string(),
                product_family: product_family.to_string(),
                attributes: BTreeMap::new(),
            },
            price: PriceFilter::default(),
        }
    }

    pub fn product_attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.product.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn price_attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.price.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Attributes sit in their own object, so an attribute named
    /// `service` never collides with the service itself.
    pub fn hash(&self) -> PriceHash {
        let product = json!({
            "service": self.product.service,
            "productFamily": self.product.product_family,
            "attributes": self.product.attributes,
        });
        let price = json!({ "attributes": self.price.attributes });

        PriceHash(format!("{}-{}", digest(&product), digest(&price)))
    }
}

/// Compact JSON; object keys come out sorted.
fn canonicalize(value: &Value) -> String {
    value.to_string()
}

fn digest(value: &Value) -> String {
    format!("{:x}", Sha256::digest(canonicalize(value).as_bytes()))
}

/// Deterministic identifier of a [`PriceSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceHash(String);

impl PriceHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PriceHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PriceHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_storage() -> PriceSpec {
        PriceSpec::new("AmazonEC2", "Storage Snapshot")
            .product_attr("region", "us-east-1")
            .product_attr("usagetype", "/EBS:SnapshotUsage$/")
            .price_attr("unit", "GB-Mo")
    }

    #[test]
    fn test_hash_format() {
        let hash = snapshot_storage().hash();
        let (product, price) = hash.as_str().split_once('-').unwrap();

        assert_eq!(product.len(), 64);
        assert_eq!(price.len(), 64);
        assert!(hash
            .as_str()
            .chars()
            .all(|c| c == '-' || c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_hash_independent_of_insertion_order() {
        let a = PriceSpec::new("AmazonEC2", "Storage")
            .product_attr("region", "us-east-1")
            .product_attr("volumeApiName", "gp2")
            .price_attr("purchaseOption", "on_demand")
            .price_attr("unit", "GB-Mo");
        let b = PriceSpec::new("AmazonEC2", "Storage")
            .price_attr("unit", "GB-Mo")
            .product_attr("volumeApiName", "gp2")
            .price_attr("purchaseOption", "on_demand")
            .product_attr("region", "us-east-1");

        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_hash_changes_with_content() {
        let base = snapshot_storage();
        let other_region = snapshot_storage().product_attr("region", "eu-west-1");
        let other_family = PriceSpec {
            product: ProductFilter {
                product_family: "Storage".to_string(),
                ..base.product.clone()
            },
            price: base.price.clone(),
        };

        assert_ne!(base.hash(), other_region.hash());
        assert_ne!(base.hash(), other_family.hash());
    }

    #[test]
    fn test_price_half_shared_between_specs_with_same_price_filter() {
        let get = PriceSpec::new("AmazonEC2", "EBS direct API Requests")
            .product_attr("usagetype", "/EBS:directAPI.snapshot.Get$/");
        let put = PriceSpec::new("AmazonEC2", "EBS direct API Requests")
            .product_attr("usagetype", "/EBS:directAPI.snapshot.Put$/");

        let get_hash = get.hash();
        let put_hash = put.hash();
        let (get_product, get_price) = get_hash.as_str().split_once('-').unwrap();
        let (put_product, put_price) = put_hash.as_str().split_once('-').unwrap();

        assert_ne!(get_product, put_product);
        assert_eq!(get_price, put_price);
    }

    #[test]
    fn test_canonical_form_is_sorted_and_escaped() {
        let mut attributes = BTreeMap::new();
        attributes.insert("b", "x\"y");
        attributes.insert("a", "1");
        let value = json!({ "z": "last", "attributes": attributes });

        assert_eq!(
            canonicalize(&value),
            r#"{"attributes":{"a":"1","b":"x\"y"},"z":"last"}"#
        );
    }

    #[test]
    fn test_attribute_cannot_shadow_service() {
        let shadowed = PriceSpec::new("AmazonEC2", "Storage").product_attr("service", "AmazonS3");
        let plain = PriceSpec::new("AmazonEC2", "Storage");
        let other_service = PriceSpec::new("AmazonS3", "Storage");

        assert_ne!(shadowed.hash(), plain.hash());
        assert_ne!(shadowed.hash(), other_service.hash());

        let family = PriceSpec::new("AmazonEC2", "Storage").product_attr("productFamily", "NAT");
        assert_ne!(family.hash(), PriceSpec::new("AmazonEC2", "NAT").hash());
    }

    #[test]
    fn test_spec_round_trips_through_json() {
        let spec = snapshot_storage();
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("\"productFamily\":\"Storage Snapshot\""));
        let back: PriceSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back.hash(), spec.hash());
    }
}
