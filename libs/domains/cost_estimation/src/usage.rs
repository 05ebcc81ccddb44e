//! Usage schema, user overrides and their resolution into quantities.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use strum::{Display, EnumString};
use tracing::warn;

use crate::error::{Diagnostic, EstimationError, EstimationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UsageValueType {
    Integer,
    Decimal,
}

/// One usage key a resource type understands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageKey {
    pub key: String,
    pub value_type: UsageValueType,
    /// `None` means "no usage provided".
    pub default: Option<Decimal>,
    pub unit: String,
}

impl UsageKey {
    pub fn integer(key: &str, unit: &str) -> Self {
        Self {
            key: key.to_string(),
            value_type: UsageValueType::Integer,
            default: None,
            unit: unit.to_string(),
        }
    }

    pub fn decimal(key: &str, unit: &str) -> Self {
        Self {
            value_type: UsageValueType::Decimal,
            ..Self::integer(key, unit)
        }
    }

    pub fn with_default(mut self, default: Decimal) -> Self {
        self.default = Some(default);
        self
    }

    fn parse(&self, raw: &Value) -> Result<Option<Decimal>, String> {
        let number = match raw {
            Value::Null => return Ok(None),
            Value::Number(n) => n.to_string(),
            Value::String(_) => return Err("expected a number, got a string".to_string()),
            Value::Bool(_) => return Err("expected a number, got a boolean".to_string()),
            Value::Array(_) => return Err("expected a number, got a list".to_string()),
            Value::Object(_) => return Err("expected a number, got a map".to_string()),
        };
        let value = Decimal::from_str(&number)
            .or_else(|_| Decimal::from_scientific(&number))
            .map_err(|e| format!("{number} is not representable: {e}"))?;
        if value < Decimal::ZERO {
            return Err(format!("{number} is negative"));
        }
        if self.value_type == UsageValueType::Integer && !value.fract().is_zero() {
            return Err(format!("expected an integer, got {number}"));
        }
        Ok(Some(value))
    }
}

/// Usage keys understood by one resource type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageSchema {
    keys: BTreeMap<String, UsageKey>,
}

impl UsageSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(mut self, key: UsageKey) -> Self {
        self.keys.insert(key.key.clone(), key);
        self
    }

    pub fn get(&self, key: &str) -> Option<&UsageKey> {
        self.keys.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &UsageKey> {
        self.keys.values()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// User-supplied usage estimates: address -> usage key -> value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageOverrides(BTreeMap<String, BTreeMap<String, Value>>);

#[derive(Deserialize)]
#[serde(untagged)]
enum UsageDocument {
    Versioned {
        #[allow(dead_code)]
        version: String,
        resource_usage: BTreeMap<String, BTreeMap<String, Value>>,
    },
    Plain(BTreeMap<String, BTreeMap<String, Value>>),
}

impl UsageOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse either a plain `{address: {key: value}}` map or the versioned
    /// `{"version": "0.1", "resource_usage": {...}}` usage file.
    pub fn from_json(json: &str) -> EstimationResult<Self> {
        let doc: UsageDocument = serde_json::from_str(json)
            .map_err(|e| EstimationError::InvalidInput(format!("usage document: {e}")))?;
        Ok(match doc {
            UsageDocument::Versioned { resource_usage, .. } => Self(resource_usage),
            UsageDocument::Plain(map) => Self(map),
        })
    }

    pub fn with(mut self, address: &str, key: &str, value: impl Into<Value>) -> Self {
        self.0
            .entry(address.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
        self
    }

    pub fn for_resource(&self, address: &str) -> Option<&BTreeMap<String, Value>> {
        self.0.get(address)
    }

    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageSource {
    Override,
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageValue {
    pub value: Option<Decimal>,
    pub source: UsageSource,
}

impl UsageValue {
    /// True when the user supplied nothing and the default carries no usage.
    pub fn is_unset(&self) -> bool {
        self.source == UsageSource::Default && self.value.is_none_or(|v| v.is_zero())
    }
}

/// Concrete usage quantities for one resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedUsage {
    values: BTreeMap<String, UsageValue>,
    invalid: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl ResolvedUsage {
    pub fn get(&self, key: &str) -> Option<&UsageValue> {
        self.values.get(key)
    }

    /// Whether any override was rejected; usage-based components of the
    /// resource cannot be trusted in that case.
    pub fn has_invalid_values(&self) -> bool {
        self.invalid
    }
}

pub struct UsageResolver<'a> {
    overrides: &'a UsageOverrides,
}

impl<'a> UsageResolver<'a> {
    pub fn new(overrides: &'a UsageOverrides) -> Self {
        Self { overrides }
    }

    /// Merge the schema defaults with the overrides for `address`.
    pub fn resolve(&self, address: &str, schema: &UsageSchema) -> ResolvedUsage {
        let supplied = self.overrides.for_resource(address);
        let mut resolved = ResolvedUsage::default();

        for key in schema.keys() {
            let override_value = supplied.and_then(|s| s.get(&key.key));
            let value = match override_value.map(|raw| key.parse(raw)) {
                Some(Ok(Some(value))) => UsageValue {
                    value: Some(value),
                    source: UsageSource::Override,
                },
                Some(Err(reason)) => {
                    warn!(
                        resource = address,
                        key = %key.key,
                        reason = %reason,
                        "Invalid usage value"
                    );
                    resolved.invalid = true;
                    resolved.diagnostics.push(Diagnostic::InvalidUsageValue {
                        key: key.key.clone(),
                        reason,
                    });
                    UsageValue {
                        value: key.default,
                        source: UsageSource::Default,
                    }
                }
                Some(Ok(None)) | None => UsageValue {
                    value: key.default,
                    source: UsageSource::Default,
                },
            };
            resolved.values.insert(key.key.clone(), value);
        }

        if let Some(supplied) = supplied {
            for key in supplied.keys().filter(|k| schema.get(k).is_none()) {
                warn!(resource = address, key = %key, "Unknown usage key");
                resolved
                    .diagnostics
                    .push(Diagnostic::UnknownUsageKey { key: key.clone() });
            }
        }

        resolved
    }
}
