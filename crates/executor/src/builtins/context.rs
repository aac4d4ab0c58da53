//! Root nodes that seed the template interpolation scopes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lattice_workflow::{Node, NodeData, NodeKind};
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::ExecutorError;
use crate::executor::Executor;

/// Seeds `{{ variable.* }}` names from `context_name`/`context_value` or
/// a `context_values` list. Must be a root node so the values exist
/// before any later level interpolates.
pub struct ContextVariableExecutor;

/// Seeds `{{ const.* }}` names; otherwise identical to
/// [`ContextVariableExecutor`].
pub struct ContextConstantExecutor;

#[async_trait]
impl Executor for ContextVariableExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::ContextVariable
    }

    fn validate(&self, node: &Node) -> Result<(), ExecutorError> {
        validate_entries(&node.data)
    }

    async fn execute(&self, ctx: &ExecutionContext, node: &Node) -> Result<Value, ExecutorError> {
        ctx.count_node_execution()?;
        require_root(ctx, node)?;
        let mut stored = serde_json::Map::new();
        for (name, value) in entries(&node.data)? {
            ctx.set_context_variable(&name, value.clone())?;
            stored.insert(name, value);
        }
        Ok(Value::Object(stored))
    }
}

#[async_trait]
impl Executor for ContextConstantExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::ContextConstant
    }

    fn validate(&self, node: &Node) -> Result<(), ExecutorError> {
        validate_entries(&node.data)
    }

    async fn execute(&self, ctx: &ExecutionContext, node: &Node) -> Result<Value, ExecutorError> {
        ctx.count_node_execution()?;
        require_root(ctx, node)?;
        let mut stored = serde_json::Map::new();
        for (name, value) in entries(&node.data)? {
            ctx.set_context_constant(&name, value.clone())?;
            stored.insert(name, value);
        }
        Ok(Value::Object(stored))
    }
}

fn require_root(ctx: &ExecutionContext, node: &Node) -> Result<(), ExecutorError> {
    if ctx.graph().predecessors(&node.id).is_empty() {
        Ok(())
    } else {
        Err(ExecutorError::Config(
            "context nodes must be root nodes (no incoming edges)".into(),
        ))
    }
}

fn validate_entries(data: &NodeData) -> Result<(), ExecutorError> {
    let has_single = data.str_field("context_name").is_some_and(|n| !n.is_empty());
    let has_list = data.get("context_values").is_some_and(Value::is_array);
    if !has_single && !has_list {
        return Err(ExecutorError::Config(
            "context node requires `context_name`+`context_value` or a `context_values` list".into(),
        ));
    }
    if let Some(list) = data.get("context_values").and_then(Value::as_array) {
        for (index, entry) in list.iter().enumerate() {
            let name = entry.get("name").and_then(Value::as_str);
            if name.is_none_or(str::is_empty) {
                return Err(ExecutorError::Config(format!(
                    "context_values[{index}] is missing a non-empty `name`"
                )));
            }
            if let Some(tag) = entry.get("type").and_then(Value::as_str) {
                if !matches!(
                    tag,
                    "string" | "number" | "boolean" | "time_string" | "epoch_second" | "epoch_ms" | "null"
                ) {
                    return Err(ExecutorError::Config(format!(
                        "context_values[{index}] has unsupported type `{tag}`"
                    )));
                }
            }
        }
    }
    Ok(())
}

fn entries(data: &NodeData) -> Result<Vec<(String, Value)>, ExecutorError> {
    let mut out = Vec::new();
    if let Some(name) = data.str_field("context_name") {
        let value = data.get("context_value").cloned().unwrap_or(Value::Null);
        out.push((name.to_owned(), value));
    }
    if let Some(list) = data.get("context_values").and_then(Value::as_array) {
        for entry in list {
            let name = entry
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| ExecutorError::Config("context_values entry is missing `name`".into()))?;
            let raw = entry.get("value").cloned().unwrap_or(Value::Null);
            let tag = entry.get("type").and_then(Value::as_str);
            out.push((name.to_owned(), coerce(raw, tag)?));
        }
    }
    Ok(out)
}

/// Coerce an entry value per its declared type. Temporal types normalize
/// to RFC 3339 strings.
fn coerce(raw: Value, tag: Option<&str>) -> Result<Value, ExecutorError> {
    let Some(tag) = tag else { return Ok(raw) };
    let out = match tag {
        "string" => match raw {
            Value::String(s) => Value::String(s),
            other => Value::String(other.to_string()),
        },
        "number" => {
            let n = raw.as_f64().or_else(|| raw.as_str().and_then(|s| s.parse().ok()));
            let n = n.ok_or_else(|| coercion_error(&raw, "number"))?;
            if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
                Value::from(n as i64)
            } else {
                Value::from(n)
            }
        }
        "boolean" => match raw {
            Value::Bool(b) => Value::Bool(b),
            Value::String(ref s) if s == "true" => Value::Bool(true),
            Value::String(ref s) if s == "false" => Value::Bool(false),
            other => return Err(coercion_error(&other, "boolean")),
        },
        "time_string" => {
            let text = raw.as_str().ok_or_else(|| coercion_error(&raw, "time_string"))?;
            let parsed: DateTime<Utc> = text
                .parse()
                .map_err(|_| coercion_error(&raw, "time_string"))?;
            Value::String(parsed.to_rfc3339())
        }
        "epoch_second" => {
            let secs = raw.as_i64().ok_or_else(|| coercion_error(&raw, "epoch_second"))?;
            let parsed = DateTime::<Utc>::from_timestamp(secs, 0)
                .ok_or_else(|| coercion_error(&raw, "epoch_second"))?;
            Value::String(parsed.to_rfc3339())
        }
        "epoch_ms" => {
            let millis = raw.as_i64().ok_or_else(|| coercion_error(&raw, "epoch_ms"))?;
            let parsed = DateTime::<Utc>::from_timestamp_millis(millis)
                .ok_or_else(|| coercion_error(&raw, "epoch_ms"))?;
            Value::String(parsed.to_rfc3339())
        }
        "null" => Value::Null,
        other => {
            return Err(ExecutorError::Config(format!(
                "unsupported context value type `{other}`"
            )));
        }
    };
    Ok(out)
}

fn coercion_error(raw: &Value, tag: &str) -> ExecutorError {
    ExecutorError::Execution(format!("context value `{raw}` does not coerce to {tag}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::testkit::{ctx_for, node};
    use serde_json::json;

    fn root_ctx() -> ExecutionContext {
        ctx_for(json!({
            "nodes": [{"id": "ctx", "type": "context_variable", "data": {"context_name": "n", "context_value": 1}}],
            "edges": []
        }))
    }

    #[tokio::test]
    async fn single_entry_seeds_the_variable_scope() {
        let ctx = root_ctx();
        let n = node(json!({"id": "ctx", "data": {"context_name": "region", "context_value": "eu"}}));
        let out = ContextVariableExecutor.execute(&ctx, &n).await.unwrap();
        assert_eq!(out, json!({"region": "eu"}));
        assert_eq!(ctx.template_value("variable", "region"), Some(json!("eu")));
        assert_eq!(ctx.template_value("const", "region"), None);
    }

    #[tokio::test]
    async fn constant_executor_seeds_the_const_scope() {
        let ctx = root_ctx();
        let n = node(json!({"id": "ctx", "data": {"context_name": "base", "context_value": "https://api.test"}}));
        ContextConstantExecutor.execute(&ctx, &n).await.unwrap();
        assert_eq!(
            ctx.template_value("const", "base"),
            Some(json!("https://api.test"))
        );
    }

    #[tokio::test]
    async fn typed_list_coercions() {
        let ctx = root_ctx();
        let n = node(json!({"id": "ctx", "data": {"context_values": [
            {"name": "s", "value": 42, "type": "string"},
            {"name": "n", "value": "3.5", "type": "number"},
            {"name": "b", "value": "true", "type": "boolean"},
            {"name": "t", "value": "2026-01-02T03:04:05Z", "type": "time_string"},
            {"name": "es", "value": 0, "type": "epoch_second"},
            {"name": "em", "value": 1500, "type": "epoch_ms"},
            {"name": "z", "value": "anything", "type": "null"}
        ]}}));
        let out = ContextVariableExecutor.execute(&ctx, &n).await.unwrap();
        assert_eq!(out["s"], json!("42"));
        assert_eq!(out["n"], json!(3.5));
        assert_eq!(out["b"], json!(true));
        assert_eq!(out["t"], json!("2026-01-02T03:04:05+00:00"));
        assert_eq!(out["es"], json!("1970-01-01T00:00:00+00:00"));
        assert_eq!(out["em"], json!("1970-01-01T00:00:01.500+00:00"));
        assert_eq!(out["z"], json!(null));
    }

    #[tokio::test]
    async fn failed_coercion_is_an_execution_error() {
        let ctx = root_ctx();
        let n = node(json!({"id": "ctx", "data": {"context_values": [
            {"name": "t", "value": "not a date", "type": "time_string"}
        ]}}));
        let err = ContextVariableExecutor.execute(&ctx, &n).await.unwrap_err();
        assert!(err.to_string().contains("time_string"));
    }

    #[tokio::test]
    async fn non_root_placement_is_rejected() {
        let ctx = ctx_for(json!({
            "nodes": [
                {"id": "a", "type": "value", "data": {"value": 1}},
                {"id": "ctx", "type": "context_variable", "data": {"context_name": "n", "context_value": 1}}
            ],
            "edges": [{"source": "a", "target": "ctx"}]
        }));
        ctx.store_output("a", json!(1)).unwrap();
        let n = node(json!({"id": "ctx", "data": {"context_name": "n", "context_value": 1}}));
        let err = ContextVariableExecutor.execute(&ctx, &n).await.unwrap_err();
        assert!(err.to_string().contains("root"));
    }

    #[test]
    fn validation() {
        assert!(ContextVariableExecutor
            .validate(&node(json!({"id": "c", "data": {}})))
            .is_err());
        assert!(ContextVariableExecutor
            .validate(&node(json!({"id": "c", "data": {"context_values": [{"value": 1}]}})))
            .is_err());
        assert!(ContextVariableExecutor
            .validate(&node(json!({"id": "c", "data": {"context_values": [{"name": "x", "value": 1, "type": "duration"}]}})))
            .is_err());
        assert!(ContextVariableExecutor
            .validate(&node(json!({"id": "c", "data": {"context_name": "x", "context_value": 1}})))
            .is_ok());
    }
}
