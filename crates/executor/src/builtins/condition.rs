//! Predicate routing node.

use async_trait::async_trait;
use lattice_workflow::{Node, NodeKind};
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::ExecutorError;
use crate::executor::Executor;

/// Evaluates `condition` against the predecessor input and emits the
/// `true_path` or `false_path` value.
///
/// Supported predicates:
///
/// - `empty` / `non_empty` -- null, `""`, `[]`, and `{}` count as empty
/// - `== x`, `!= x` -- numeric compare when both sides are numbers,
///   string compare otherwise
/// - `> n`, `>= n`, `< n`, `<= n` -- numeric compare
/// - `contains x` -- substring test on a string input
///
/// When the selected path value is absent, a true verdict passes the
/// input through and a false verdict emits null.
pub struct ConditionExecutor;

#[async_trait]
impl Executor for ConditionExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::Condition
    }

    fn validate(&self, node: &Node) -> Result<(), ExecutorError> {
        match node.data.str_field("condition") {
            None => Err(ExecutorError::Config(
                "condition node requires a string `condition` field".into(),
            )),
            Some(cond) if cond.trim().is_empty() => {
                Err(ExecutorError::Config("condition is empty".into()))
            }
            Some(_) => Ok(()),
        }
    }

    async fn execute(&self, ctx: &ExecutionContext, node: &Node) -> Result<Value, ExecutorError> {
        ctx.count_node_execution()?;
        let condition = node
            .data
            .str_field("condition")
            .ok_or_else(|| ExecutorError::Config("condition node requires a string `condition` field".into()))?;
        let input = ctx.first_input(&node.id)?.unwrap_or(Value::Null);

        let verdict = evaluate(condition, &input)?;
        tracing::debug!(node_id = %node.id, %condition, verdict, "condition evaluated");

        let out = if verdict {
            node.data.get("true_path").cloned().unwrap_or(input)
        } else {
            node.data.get("false_path").cloned().unwrap_or(Value::Null)
        };
        Ok(out)
    }
}

fn evaluate(condition: &str, input: &Value) -> Result<bool, ExecutorError> {
    let condition = condition.trim();
    match condition {
        "empty" => return Ok(is_empty(input)),
        "non_empty" => return Ok(!is_empty(input)),
        _ => {}
    }

    if let Some(needle) = condition.strip_prefix("contains ") {
        let haystack = input.as_str().ok_or_else(|| ExecutorError::TypeMismatch {
            expected: "string".into(),
            found: kind(input).into(),
        })?;
        return Ok(haystack.contains(needle.trim()));
    }

    // Two-character operators before their one-character prefixes.
    for op in [">=", "<=", "==", "!=", ">", "<"] {
        if let Some(rhs) = condition.strip_prefix(op) {
            return compare(op, input, rhs.trim());
        }
    }

    Err(ExecutorError::Execution(format!(
        "unsupported condition `{condition}`"
    )))
}

fn compare(op: &str, input: &Value, rhs: &str) -> Result<bool, ExecutorError> {
    // Equality falls back to string comparison for non-numeric inputs.
    if matches!(op, "==" | "!=") {
        let equal = match (input.as_f64(), rhs.parse::<f64>().ok()) {
            (Some(lhs), Some(rhs)) => (lhs - rhs).abs() < f64::EPSILON,
            _ => stringify(input) == rhs,
        };
        return Ok(if op == "==" { equal } else { !equal });
    }

    let lhs = input.as_f64().ok_or_else(|| ExecutorError::TypeMismatch {
        expected: "number".into(),
        found: kind(input).into(),
    })?;
    let rhs: f64 = rhs.parse().map_err(|_| {
        ExecutorError::Execution(format!("condition operand `{rhs}` is not a number"))
    })?;
    Ok(match op {
        ">" => lhs > rhs,
        ">=" => lhs >= rhs,
        "<" => lhs < rhs,
        "<=" => lhs <= rhs,
        _ => false,
    })
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
