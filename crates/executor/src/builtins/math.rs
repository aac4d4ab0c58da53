//! Arithmetic over predecessor inputs.

use async_trait::async_trait;
use lattice_workflow::{Node, NodeKind};
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::ExecutorError;
use crate::executor::Executor;

const OPS: [&str; 6] = ["add", "subtract", "multiply", "divide", "mod", "pow"];

/// Folds every predecessor input with the configured operation.
///
/// Inputs arrive in edge-declaration order, which is what makes
/// `subtract` and `divide` well defined. All inputs must be numbers.
pub struct ArithmeticExecutor;

#[async_trait]
impl Executor for ArithmeticExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::Arithmetic
    }

    fn validate(&self, node: &Node) -> Result<(), ExecutorError> {
        match node.data.str_field("op") {
            None => Err(ExecutorError::Config(
                "arithmetic node requires an `op` field".into(),
            )),
            Some(op) if OPS.contains(&op) => Ok(()),
            Some(op) => Err(ExecutorError::Config(format!(
                "unsupported arithmetic op `{op}`"
            ))),
        }
    }

    async fn execute(&self, ctx: &ExecutionContext, node: &Node) -> Result<Value, ExecutorError> {
        ctx.count_node_execution()?;
        let op = node
            .data
            .str_field("op")
            .ok_or_else(|| ExecutorError::Config("arithmetic node requires an `op` field".into()))?;

        let inputs = ctx.inputs_for(&node.id)?;
        if inputs.is_empty() {
            return Err(ExecutorError::Execution(
                "arithmetic node has no inputs".into(),
            ));
        }
        let numbers: Vec<f64> = inputs
            .iter()
            .map(|v| {
                v.as_f64().ok_or_else(|| ExecutorError::TypeMismatch {
                    expected: "number".into(),
                    found: type_name(v).into(),
                })
            })
            .collect::<Result<_, _>>()?;

        let mut result = numbers[0];
        for &rhs in &numbers[1..] {
            result = apply(op, result, rhs)?;
        }
        if !result.is_finite() {
            return Err(ExecutorError::Execution(
                "arithmetic result is not a finite number".into(),
            ));
        }
        Ok(number(result))
    }
}

fn apply(op: &str, lhs: f64, rhs: f64) -> Result<f64, ExecutorError> {
    match op {
        "add" => Ok(lhs + rhs),
        "subtract" => Ok(lhs - rhs),
        "multiply" => Ok(lhs * rhs),
        "divide" => {
            if rhs == 0.0 {
                return Err(ExecutorError::Execution("division by zero".into()));
            }
            Ok(lhs / rhs)
        }
        "mod" => {
            if rhs == 0.0 {
                return Err(ExecutorError::Execution("division by zero".into()));
            }
            Ok(lhs % rhs)
        }
        "pow" => Ok(lhs.powf(rhs)),
        other => Err(ExecutorError::Config(format!(
            "unsupported arithmetic op `{other}`"
        ))),
    }
}

/// Whole results serialize as integers so `10 + 5` reads as `15`, not `15.0`.
fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
