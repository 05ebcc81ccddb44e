use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::{EstimationError, EstimationResult};

/// Attribute value as produced by the infrastructure parser.
///
/// Strings are tried before numbers so that opaque identifiers such as
/// `"vol-0123"` or `"10"` keep their textual form; numeric accessors parse
/// text on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Text(String),
    Number(Decimal),
    List(Vec<AttributeValue>),
    Reference(ResourceRef),
    Block(BTreeMap<String, AttributeValue>),
}

/// Edge to another resource in the graph, written as `{"$ref": "<address>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceRef {
    #[serde(rename = "$ref")]
    pub address: String,
}

impl AttributeValue {
    pub fn reference(address: impl Into<String>) -> Self {
        Self::Reference(ResourceRef {
            address: address.into(),
        })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => Decimal::from_str(s.trim()).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&ResourceRef> {
        match self {
            Self::Reference(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&BTreeMap<String, AttributeValue>> {
        match self {
            Self::Block(b) => Some(b),
            _ => None,
        }
    }

    /// Nested blocks as a slice of maps. A single block is treated as a
    /// one-element list, matching how plan JSON renders `max_items = 1` blocks.
    pub fn blocks(&self) -> Vec<&BTreeMap<String, AttributeValue>> {
        match self {
            Self::Block(b) => vec![b],
            Self::List(items) => items.iter().filter_map(|i| i.as_block()).collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Decimal> for AttributeValue {
    fn from(value: Decimal) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Number(Decimal::from(value))
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        Self::Number(Decimal::from(value))
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A single infrastructure object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Address, unique within a run (e.g. `aws_ebs_volume.gp2`)
    pub address: String,
    /// Resource type tag (e.g. `aws_ebs_volume`)
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
    /// Resources whose cost rolls up into this one
    #[serde(default)]
    pub children: Vec<Resource>,
}

impl Resource {
    pub fn new(address: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            resource_type: resource_type.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn with_child(mut self, child: Resource) -> Self {
        self.children.push(child);
        self
    }

    /// Attribute lookup; explicit nulls are treated as absent.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name).filter(|v| !v.is_null())
    }

    pub fn str_attr(&self, name: &str) -> Option<&str> {
        self.attribute(name).and_then(AttributeValue::as_str)
    }

    pub fn decimal_attr(&self, name: &str) -> Option<Decimal> {
        self.attribute(name).and_then(AttributeValue::as_decimal)
    }

    pub fn bool_attr(&self, name: &str) -> Option<bool> {
        self.attribute(name).and_then(AttributeValue::as_bool)
    }
}

/// The parsed resource graph for one estimation run.
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    roots: Vec<Resource>,
    /// Address -> path of child indices from the roots.
    index: BTreeMap<String, Vec<usize>>,
}

#[derive(Deserialize)]
struct GraphDocument {
    resources: Vec<Resource>,
}

impl ResourceGraph {
    pub fn new(resources: Vec<Resource>) -> EstimationResult<Self> {
        let mut graph = Self {
            roots: Vec::new(),
            index: BTreeMap::new(),
        };
        for resource in resources {
            graph.insert(resource)?;
        }
        Ok(graph)
    }

    /// Parse a `{"resources": [...]}` document.
    pub fn from_json(json: &str) -> EstimationResult<Self> {
        let doc: GraphDocument = serde_json::from_str(json)
            .map_err(|e| EstimationError::InvalidInput(format!("resource graph: {e}")))?;
        Self::new(doc.resources)
    }

    fn insert(&mut self, resource: Resource) -> EstimationResult<()> {
        let root = self.roots.len();
        let mut pending = vec![(vec![root], &resource)];
        let mut discovered: Vec<(String, Vec<usize>)> = Vec::new();
        while let Some((path, node)) = pending.pop() {
            if self.index.contains_key(&node.address)
                || discovered.iter().any(|(a, _)| a == &node.address)
            {
                return Err(EstimationError::InvalidInput(format!(
                    "duplicate resource address: {}",
                    node.address
                )));
            }
            for (i, child) in node.children.iter().enumerate() {
                let mut child_path = path.clone();
                child_path.push(i);
                pending.push((child_path, child));
            }
            discovered.push((node.address.clone(), path));
        }
        self.index.extend(discovered);
        self.roots.push(resource);
        Ok(())
    }

    /// Top-level resources, sorted by address.
    pub fn roots(&self) -> Vec<&Resource> {
        let mut roots: Vec<&Resource> = self.roots.iter().collect();
        roots.sort_by(|a, b| a.address.cmp(&b.address));
        roots
    }

    pub fn get(&self, address: &str) -> Option<&Resource> {
        let path = self.index.get(address)?;
        let (first, rest) = path.split_first()?;
        let mut node = self.roots.get(*first)?;
        for i in rest {
            node = node.children.get(*i)?;
        }
        Some(node)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
