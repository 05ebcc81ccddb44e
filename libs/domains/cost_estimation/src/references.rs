//! Cross-resource attribute resolution.
//!
//! Edges are attributes holding `{"$ref": "<address>"}`. Resolution always
//! returns an owned value: either the target's attribute, or the caller's
//! fallback together with a diagnostic explaining why the fallback was used.

use rust_decimal::Decimal;
use tracing::debug;

use crate::error::Diagnostic;
use crate::models::{AttributeValue, Resource, ResourceGraph};

/// Outcome of resolving a referenced attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<T> {
    pub value: T,
    /// Set when `value` is the fallback rather than the real attribute.
    pub assumption: Option<Diagnostic>,
}

impl<T> Resolution<T> {
    fn resolved(value: T) -> Self {
        Self {
            value,
            assumption: None,
        }
    }

    pub fn is_assumed(&self) -> bool {
        self.assumption.is_some()
    }
}

#[derive(Clone, Copy)]
pub struct ReferenceResolver<'g> {
    graph: &'g ResourceGraph,
}

impl<'g> ReferenceResolver<'g> {
    pub fn new(graph: &'g ResourceGraph) -> Self {
        Self { graph }
    }

    /// Follow `edges` from `source` one hop at a time, returning the final
    /// target resource or a description of where the walk stopped.
    pub fn follow(&self, source: &Resource, edges: &[&str]) -> Result<&'g Resource, String> {
        let mut current: Option<&'g Resource> = None;
        for edge in edges {
            let from: &Resource = current.unwrap_or(source);
            let next = match from.attribute(edge) {
                Some(AttributeValue::Reference(target)) => self
                    .graph
                    .get(&target.address)
                    .ok_or_else(|| format!("{} is not in the resource graph", target.address))?,
                Some(AttributeValue::Text(id)) => {
                    return Err(format!("{edge} refers to external resource '{id}'"));
                }
                Some(_) => return Err(format!("{edge} is not a reference")),
                None => return Err(format!("{edge} is not set on {}", from.address)),
            };
            current = Some(next);
        }
        current.ok_or_else(|| "no edge given".to_string())
    }

    /// Resolve `attribute` on the resource reached through `edges`.
    pub fn resolve(
        &self,
        source: &Resource,
        edges: &[&str],
        attribute: &str,
        fallback: AttributeValue,
    ) -> Resolution<AttributeValue> {
        let outcome = self.follow(source, edges).and_then(|target| {
            target
                .attribute(attribute)
                .cloned()
                .ok_or_else(|| format!("{} has no {attribute}", target.address))
        });
        match outcome {
            Ok(value) => Resolution::resolved(value),
            Err(reason) => {
                let assumed = match &fallback {
                    AttributeValue::Number(n) => n.to_string(),
                    AttributeValue::Text(s) => s.clone(),
                    other => format!("{other:?}"),
                };
                self.fallback(source, edges, attribute, fallback, assumed, reason)
            }
        }
    }

    /// Resolve a numeric attribute, falling back to `fallback` when the
    /// target is missing or the value is not numeric.
    pub fn resolve_decimal(
        &self,
        source: &Resource,
        edges: &[&str],
        attribute: &str,
        fallback: Decimal,
    ) -> Resolution<Decimal> {
        let resolution = self.resolve(source, edges, attribute, fallback.into());
        match resolution.value.as_decimal() {
            Some(value) => Resolution {
                value,
                assumption: resolution.assumption,
            },
            None => self.fallback(
                source,
                edges,
                attribute,
                fallback,
                fallback.to_string(),
                format!("{attribute} is not numeric"),
            ),
        }
    }

    fn fallback<T>(
        &self,
        source: &Resource,
        edges: &[&str],
        attribute: &str,
        value: T,
        assumed: String,
        reason: String,
    ) -> Resolution<T> {
        let edge = edges.join(".");
        debug!(
            resource = %source.address,
            edge = %edge,
            attribute,
            reason = %reason,
            assumed = %assumed,
            "Reference unresolved, using fallback"
        );
        Resolution {
            value,
            assumption: Some(Diagnostic::UnresolvedReference {
                edge,
                attribute: attribute.to_string(),
                assumed,
                reason,
            }),
        }
    }
}
