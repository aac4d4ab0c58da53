//! Node kinds and the deterministic kind-inference rules.

use serde::{Deserialize, Serialize};

use crate::payload::NodeData;

/// The built-in node kinds.
///
/// Custom kinds registered by the embedder use [`NodeKind::Custom`]; its
/// tag is the registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Constant value.
    Value,
    /// Fold numeric inputs with an arithmetic operation.
    Arithmetic,
    /// Format the input for display.
    Visualization,
    /// Constant (template-interpolated) text.
    Text,
    /// String operation on the input.
    TextOp,
    /// HTTP GET through the egress guard.
    Http,
    /// Predicate routing between two values.
    Condition,
    /// Read/write the execution variable map.
    Variable,
    /// Fold the input into the accumulator slot.
    Accumulator,
    /// Mutate the scalar counter slot.
    Counter,
    /// Get-or-store against the execution cache.
    Cache,
    /// Cancellation-aware sleep; requires an explicit tag.
    Delay,
    /// Retried HTTP fetch with backoff; requires an explicit tag.
    Retry,
    /// Repeat the input into a collection; requires an explicit tag.
    Repeat,
    /// Root node seeding interpolation variables.
    ContextVariable,
    /// Root node seeding interpolation constants.
    ContextConstant,
    /// Embedder-registered kind.
    #[serde(untagged)]
    Custom(String),
}

impl NodeKind {
    /// Stable tag for registry lookup and event reporting.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Value => "value",
            Self::Arithmetic => "arithmetic",
            Self::Visualization => "visualization",
            Self::Text => "text",
            Self::TextOp => "text_op",
            Self::Http => "http",
            Self::Condition => "condition",
            Self::Variable => "variable",
            Self::Accumulator => "accumulator",
            Self::Counter => "counter",
            Self::Cache => "cache",
            Self::Delay => "delay",
            Self::Retry => "retry",
            Self::Repeat => "repeat",
            Self::ContextVariable => "context_variable",
            Self::ContextConstant => "context_constant",
            Self::Custom(tag) => tag,
        }
    }

    /// Infer a kind from the populated configuration fields.
    ///
    /// First match wins, in this fixed priority order:
    ///
    /// 1. numeric `value` → [`NodeKind::Value`]
    /// 2. `op` → [`NodeKind::Arithmetic`]
    /// 3. `mode` → [`NodeKind::Visualization`]
    /// 4. `text` → [`NodeKind::Text`]
    /// 5. `text_op` → [`NodeKind::TextOp`]
    /// 6. `url` → [`NodeKind::Http`]
    /// 7. `condition` → [`NodeKind::Condition`]
    /// 8. `var_name` → [`NodeKind::Variable`]
    /// 9. `accum_op` → [`NodeKind::Accumulator`]
    /// 10. `counter_op` → [`NodeKind::Counter`]
    /// 11. `cache_key` → [`NodeKind::Cache`]
    /// 12. `context_name` or `context_values` → [`NodeKind::ContextVariable`]
    ///
    /// Delay, retry, repeat, and context-constant nodes share their
    /// distinguishing fields with other kinds (`timeout`, `max_attempts`,
    /// `repeat_n`) and therefore always require an explicit tag.
    #[must_use]
    pub fn infer(data: &NodeData) -> Option<Self> {
        if data.get("value").is_some_and(serde_json::Value::is_number) {
            return Some(Self::Value);
        }
        if data.has("op") {
            return Some(Self::Arithmetic);
        }
        if data.has("mode") {
            return Some(Self::Visualization);
        }
        if data.has("text") {
            return Some(Self::Text);
        }
        if data.has("text_op") {
            return Some(Self::TextOp);
        }
        if data.has("url") {
            return Some(Self::Http);
        }
        if data.has("condition") {
            return Some(Self::Condition);
        }
        if data.has("var_name") {
            return Some(Self::Variable);
        }
        if data.has("accum_op") {
            return Some(Self::Accumulator);
        }
        if data.has("counter_op") {
            return Some(Self::Counter);
        }
        if data.has("cache_key") {
            return Some(Self::Cache);
        }
        if data.has("context_name") || data.has("context_values") {
            return Some(Self::ContextVariable);
        }
        None
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
