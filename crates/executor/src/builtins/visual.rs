//! Display-formatting node.

use async_trait::async_trait;
use lattice_workflow::{Node, NodeKind};
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::ExecutorError;
use crate::executor::Executor;

/// Formats the predecessor input for display.
///
/// Modes: `raw` passes the input through; `summary` describes its shape;
/// `table` turns an array of objects into `{columns, rows}`.
pub struct VisualizationExecutor;

#[async_trait]
impl Executor for VisualizationExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::Visualization
    }

    fn validate(&self, node: &Node) -> Result<(), ExecutorError> {
        match node.data.str_field("mode").unwrap_or("raw") {
            "raw" | "summary" | "table" => Ok(()),
            other => Err(ExecutorError::Config(format!(
                "unsupported visualization mode `{other}`"
            ))),
        }
    }

    async fn execute(&self, ctx: &ExecutionContext, node: &Node) -> Result<Value, ExecutorError> {
        ctx.count_node_execution()?;
        let mode = node.data.str_field("mode").unwrap_or("raw");
        let input = ctx.first_input(&node.id)?.unwrap_or(Value::Null);

        match mode {
            "raw" => Ok(input),
            "summary" => Ok(summarize(&input)),
            "table" => tabulate(&input),
            other => Err(ExecutorError::Config(format!(
                "unsupported visualization mode `{other}`"
            ))),
        }
    }
}

fn summarize(value: &Value) -> Value {
    let mut out = serde_json::Map::new();
    match value {
        Value::Null => {
            out.insert("type".into(), Value::from("null"));
        }
        Value::Bool(b) => {
            out.insert("type".into(), Value::from("boolean"));
            out.insert("value".into(), Value::from(*b));
        }
        Value::Number(n) => {
            out.insert("type".into(), Value::from("number"));
            out.insert("value".into(), Value::Number(n.clone()));
        }
        Value::String(s) => {
            out.insert("type".into(), Value::from("string"));
            out.insert("length".into(), Value::from(s.chars().count()));
            out.insert(
                "preview".into(),
                Value::from(s.chars().take(64).collect::<String>()),
            );
        }
        Value::Array(items) => {
            out.insert("type".into(), Value::from("array"));
            out.insert("length".into(), Value::from(items.len()));
        }
        Value::Object(map) => {
            out.insert("type".into(), Value::from("object"));
            let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
            keys.sort_unstable();
            out.insert(
                "keys".into(),
                Value::Array(keys.into_iter().map(Value::from).collect()),
            );
        }
    }
    Value::Object(out)
}

fn tabulate(value: &Value) -> Result<Value, ExecutorError> {
    let rows_in = value.as_array().ok_or_else(|| ExecutorError::TypeMismatch {
        expected: "array of objects".into(),
        found: match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
        .into(),
    })?;

    let mut columns: Vec<String> = Vec::new();
    for row in rows_in {
        if let Some(map) = row.as_object() {
            for key in map.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
    }
    columns.sort_unstable();

    let rows: Vec<Value> = rows_in
        .iter()
        .map(|row| {
            let cells: Vec<Value> = columns
                .iter()
                .map(|col| row.get(col).cloned().unwrap_or(Value::Null))
                .collect();
            Value::Array(cells)
        })
        .collect();

    let mut out = serde_json::Map::new();
    out.insert(
        "columns".into(),
        Value::Array(columns.into_iter().map(Value::from).collect()),
    );
    out.insert("rows".into(), Value::Array(rows));
    Ok(Value::Object(out))
}
