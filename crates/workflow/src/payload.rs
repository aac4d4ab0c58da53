//! The JSON payload model: nodes, edges, and node configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::kind::NodeKind;

/// A workflow definition as submitted by the embedder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowPayload {
    /// Nodes of the graph.
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Directed edges between node ids.
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// One node: a unique id, an optional explicit kind, and a configuration
/// payload whose populated fields otherwise determine the kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier within the workflow.
    pub id: String,
    /// Explicit kind tag; inferred from `data` when absent.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<NodeKind>,
    /// Kind-specific configuration.
    #[serde(default)]
    pub data: NodeData,
}

impl Node {
    /// Resolve the node's kind: the explicit tag wins, otherwise the
    /// deterministic inference over populated `data` fields.
    #[must_use]
    pub fn resolved_kind(&self) -> Option<NodeKind> {
        self.kind.clone().or_else(|| NodeKind::infer(&self.data))
    }
}

/// Ordered pair of node ids. Multi-edges between the same pair are
/// allowed and count as independent input entries at the target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Optional edge identifier, carried through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Source node id.
    pub source: String,
    /// Target node id.
    pub target: String,
}

impl Edge {
    /// Edge without an id.
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: None,
            source: source.into(),
            target: target.into(),
        }
    }
}

/// A node's configuration: the union of recognized fields, kept as a JSON
/// map so custom executors can carry fields the engine does not know.
///
/// Typed accessors cover the recognized field shapes; a missing field and
/// a field of the wrong type both read as `None` -- executors report the
/// distinction through their own `validate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeData(pub serde_json::Map<String, Value>);

impl NodeData {
    /// Raw field access.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// True when the field is present (any type, including null).
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// String field.
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Numeric field as `f64`.
    #[must_use]
    pub fn num_field(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    /// Numeric field truncated to `u32` (negative reads as `None`).
    #[must_use]
    pub fn u32_field(&self, key: &str) -> Option<u32> {
        self.0
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
    }

    /// Boolean field.
    #[must_use]
    pub fn bool_field(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// Array-of-strings field; non-string elements are skipped.
    #[must_use]
    pub fn str_list_field(&self, key: &str) -> Option<Vec<&str>> {
        self.0.get(key).and_then(Value::as_array).map(|items| {
            items.iter().filter_map(Value::as_str).collect()
        })
    }

    /// Insert or replace a field.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }
}

impl From<serde_json::Map<String, Value>> for NodeData {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        Self(map)
    }
}
