//! Stateful nodes: variables, the accumulator, and the counter.
//!
//! These touch execution-scoped shared state. Peers on the same level
//! mutate it without cross-node ordering; workflows that care place such
//! nodes on different levels or run sequentially.

use async_trait::async_trait;
use lattice_workflow::{Node, NodeKind};
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::ExecutorError;
use crate::executor::Executor;

/// `set` / `get` / `delete` / `append` on the execution variable map.
pub struct VariableExecutor;

#[async_trait]
impl Executor for VariableExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::Variable
    }

    fn validate(&self, node: &Node) -> Result<(), ExecutorError> {
        if node.data.str_field("var_name").is_none_or(str::is_empty) {
            return Err(ExecutorError::Config(
                "variable node requires a non-empty `var_name` field".into(),
            ));
        }
        match node.data.str_field("var_op").unwrap_or("set") {
            "set" | "get" | "delete" | "append" => Ok(()),
            other => Err(ExecutorError::Config(format!(
                "unsupported variable op `{other}`"
            ))),
        }
    }

    async fn execute(&self, ctx: &ExecutionContext, node: &Node) -> Result<Value, ExecutorError> {
        ctx.count_node_execution()?;
        let name = node
            .data
            .str_field("var_name")
            .ok_or_else(|| ExecutorError::Config("variable node requires a `var_name` field".into()))?;
        let op = node.data.str_field("var_op").unwrap_or("set");

        match op {
            "set" => {
                let value = incoming_value(ctx, node)?;
                ctx.set_variable(name, value.clone())?;
                Ok(value)
            }
            "get" => ctx.variable(name).ok_or_else(|| {
                ExecutorError::Execution(format!("variable `{name}` is not set"))
            }),
            "delete" => Ok(ctx.remove_variable(name).unwrap_or(Value::Null)),
            "append" => {
                let item = incoming_value(ctx, node)?;
                let mut items = match ctx.variable(name) {
                    None | Some(Value::Null) => Vec::new(),
                    Some(Value::Array(items)) => items,
                    Some(other) => vec![other],
                };
                items.push(item);
                let out = Value::Array(items);
                ctx.set_variable(name, out.clone())?;
                Ok(out)
            }
            other => Err(ExecutorError::Config(format!(
                "unsupported variable op `{other}`"
            ))),
        }
    }
}

/// Folds the input into the single accumulator slot.
pub struct AccumulatorExecutor;

#[async_trait]
impl Executor for AccumulatorExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::Accumulator
    }

    fn validate(&self, node: &Node) -> Result<(), ExecutorError> {
        match node.data.str_field("accum_op") {
            None => Err(ExecutorError::Config(
                "accumulator node requires an `accum_op` field".into(),
            )),
            Some("sum" | "product" | "concat" | "collect") => Ok(()),
            Some(other) => Err(ExecutorError::Config(format!(
                "unsupported accumulator op `{other}`"
            ))),
        }
    }

    async fn execute(&self, ctx: &ExecutionContext, node: &Node) -> Result<Value, ExecutorError> {
        ctx.count_node_execution()?;
        let op = node
            .data
            .str_field("accum_op")
            .ok_or_else(|| ExecutorError::Config("accumulator node requires an `accum_op` field".into()))?;

        let mut acc = match ctx.accumulator() {
            Some(value) => value,
            None => node
                .data
                .get("initial_value")
                .cloned()
                .unwrap_or_else(|| seed(op)),
        };
        for input in ctx.inputs_for(&node.id)? {
            acc = fold(op, acc, input)?;
        }
        ctx.set_accumulator(acc.clone())?;
        Ok(acc)
    }
}

fn seed(op: &str) -> Value {
    match op {
        "sum" => Value::from(0),
        "product" => Value::from(1),
        "concat" => Value::String(String::new()),
        _ => Value::Array(Vec::new()),
    }
}

fn fold(op: &str, acc: Value, input: Value) -> Result<Value, ExecutorError> {
    match op {
        "sum" | "product" => {
            let lhs = acc.as_f64().ok_or_else(|| numeric_mismatch(&acc))?;
            let rhs = input.as_f64().ok_or_else(|| numeric_mismatch(&input))?;
            let result = if op == "sum" { lhs + rhs } else { lhs * rhs };
            Ok(if result.fract() == 0.0 {
                Value::from(result as i64)
            } else {
                Value::from(result)
            })
        }
        "concat" => {
            let mut text = match acc {
                Value::String(s) => s,
                other => other.to_string(),
            };
            match input {
                Value::String(s) => text.push_str(&s),
                other => text.push_str(&other.to_string()),
            }
            Ok(Value::String(text))
        }
        "collect" => {
            let mut items = match acc {
                Value::Array(items) => items,
                Value::Null => Vec::new(),
                other => vec![other],
            };
            items.push(input);
            Ok(Value::Array(items))
        }
        other => Err(ExecutorError::Config(format!(
            "unsupported accumulator op `{other}`"
        ))),
    }
}

fn numeric_mismatch(value: &Value) -> ExecutorError {
    ExecutorError::TypeMismatch {
        expected: "number".into(),
        found: match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
        .into(),
    }
}

/// `increment` / `decrement` / `reset` / `get` on the scalar counter.
pub struct CounterExecutor;

#[async_trait]
impl Executor for CounterExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::Counter
    }

    fn validate(&self, node: &Node) -> Result<(), ExecutorError> {
        match node.data.str_field("counter_op") {
            None => Err(ExecutorError::Config(
                "counter node requires a `counter_op` field".into(),
            )),
            Some("increment" | "decrement" | "reset" | "get") => Ok(()),
            Some(other) => Err(ExecutorError::Config(format!(
                "unsupported counter op `{other}`"
            ))),
        }
    }

    async fn execute(&self, ctx: &ExecutionContext, node: &Node) -> Result<Value, ExecutorError> {
        ctx.count_node_execution()?;
        let op = node
            .data
            .str_field("counter_op")
            .ok_or_else(|| ExecutorError::Config("counter node requires a `counter_op` field".into()))?;
        let delta = node.data.num_field("delta").unwrap_or(1.0);

        let value = match op {
            "increment" => {
                let next = ctx.counter() + delta;
                ctx.set_counter(next);
                next
            }
            "decrement" => {
                let next = ctx.counter() - delta;
                ctx.set_counter(next);
                next
            }
            "reset" => {
                let base = node.data.num_field("initial_value").unwrap_or(0.0);
                ctx.set_counter(base);
                base
            }
            _ => ctx.counter(),
        };
        Ok(if value.fract() == 0.0 {
            Value::from(value as i64)
        } else {
            Value::from(value)
        })
    }
}

fn incoming_value(ctx: &ExecutionContext, node: &Node) -> Result<Value, ExecutorError> {
    if let Some(input) = ctx.first_input(&node.id)? {
        return Ok(input);
    }
    node.data
        .get("value")
        .or_else(|| node.data.get("initial_value"))
        .cloned()
        .ok_or_else(|| {
            ExecutorError::Execution(
                "variable node needs an input edge or a `value`/`initial_value` field".into(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::testkit::{ctx_for, node};
    use serde_json::json;

    fn piped_ctx(input: Value) -> ExecutionContext {
        let ctx = ctx_for(json!({
            "nodes": [
                {"id": "src", "type": "value", "data": {"value": 0}},
                {"id": "n", "type": "variable", "data": {"var_name": "x"}}
            ],
            "edges": [{"source": "src", "target": "n"}]
        }));
        ctx.store_output("src", input).unwrap();
        ctx
    }

    #[tokio::test]
    async fn variable_set_then_get() {
        let ctx = piped_ctx(json!(42));
        let set = node(json!({"id": "n", "data": {"var_name": "x", "var_op": "set"}}));
        assert_eq!(VariableExecutor.execute(&ctx, &set).await.unwrap(), json!(42));

        let get = node(json!({"id": "lone", "data": {"var_name": "x", "var_op": "get"}}));
        let ctx2 = piped_ctx(json!(null));
        ctx2.set_variable("x", json!(42)).unwrap();
        assert_eq!(VariableExecutor.execute(&ctx2, &get).await.unwrap(), json!(42));
    }

    #[tokio::test]
    async fn variable_get_unset_fails() {
        let ctx = piped_ctx(json!(null));
        let get = node(json!({"id": "n", "data": {"var_name": "ghost", "var_op": "get"}}));
        let err = VariableExecutor.execute(&ctx, &get).await.unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[tokio::test]
    async fn variable_append_builds_an_array() {
        let ctx = piped_ctx(json!("first"));
        let append = node(json!({"id": "n", "data": {"var_name": "log", "var_op": "append"}}));
        assert_eq!(
            VariableExecutor.execute(&ctx, &append).await.unwrap(),
            json!(["first"])
        );
        // Second append extends the existing array.
        ctx.store_output("src", json!("second")).unwrap();
        assert_eq!(
            VariableExecutor.execute(&ctx, &append).await.unwrap(),
            json!(["first", "second"])
        );
    }

    #[tokio::test]
    async fn variable_delete_returns_previous() {
        let ctx = piped_ctx(json!(null));
        ctx.set_variable("x", json!(7)).unwrap();
        let del = node(json!({"id": "n", "data": {"var_name": "x", "var_op": "delete"}}));
        assert_eq!(VariableExecutor.execute(&ctx, &del).await.unwrap(), json!(7));
        assert_eq!(ctx.variable("x"), None);
    }

    fn accum_ctx(inputs: &[Value]) -> ExecutionContext {
        let ctx = ctx_for(json!({
            "nodes": [
                {"id": "a", "type": "value", "data": {"value": 0}},
                {"id": "b", "type": "value", "data": {"value": 0}},
                {"id": "acc", "data": {"accum_op": "sum"}}
            ],
            "edges": [
                {"source": "a", "target": "acc"},
                {"source": "b", "target": "acc"}
            ]
        }));
        ctx.store_output("a", inputs[0].clone()).unwrap();
        ctx.store_output("b", inputs[1].clone()).unwrap();
        ctx
    }

    #[tokio::test]
    async fn accumulator_sum_with_initial_value() {
        let ctx = accum_ctx(&[json!(2), json!(3)]);
        let n = node(json!({"id": "acc", "data": {"accum_op": "sum", "initial_value": 10}}));
        assert_eq!(AccumulatorExecutor.execute(&ctx, &n).await.unwrap(), json!(15));
        // The slot persists: running again folds on top of 15.
        assert_eq!(AccumulatorExecutor.execute(&ctx, &n).await.unwrap(), json!(20));
    }

    #[tokio::test]
    async fn accumulator_concat_and_collect() {
        let ctx = accum_ctx(&[json!("a"), json!("b")]);
        let n = node(json!({"id": "acc", "data": {"accum_op": "concat"}}));
        assert_eq!(
            AccumulatorExecutor.execute(&ctx, &n).await.unwrap(),
            json!("ab")
        );

        let ctx = accum_ctx(&[json!(1), json!({"k": 2})]);
        let n = node(json!({"id": "acc", "data": {"accum_op": "collect"}}));
        assert_eq!(
            AccumulatorExecutor.execute(&ctx, &n).await.unwrap(),
            json!([1, {"k": 2}])
        );
    }

    #[tokio::test]
    async fn accumulator_sum_rejects_strings() {
        let ctx = accum_ctx(&[json!(1), json!("two")]);
        let n = node(json!({"id": "acc", "data": {"accum_op": "sum"}}));
        let err = AccumulatorExecutor.execute(&ctx, &n).await.unwrap_err();
        assert!(matches!(err, ExecutorError::TypeMismatch { .. }));
    }

    #[tokio::test]
    async fn counter_ops() {
        let ctx = piped_ctx(json!(null));
        let incr = node(json!({"id": "n", "data": {"counter_op": "increment", "delta": 2.5}}));
        assert_eq!(CounterExecutor.execute(&ctx, &incr).await.unwrap(), json!(2.5));

        let decr = node(json!({"id": "n", "data": {"counter_op": "decrement"}}));
        assert_eq!(CounterExecutor.execute(&ctx, &decr).await.unwrap(), json!(1.5));

        let reset = node(json!({"id": "n", "data": {"counter_op": "reset", "initial_value": 100}}));
        assert_eq!(CounterExecutor.execute(&ctx, &reset).await.unwrap(), json!(100));

        let get = node(json!({"id": "n", "data": {"counter_op": "get"}}));
        assert_eq!(CounterExecutor.execute(&ctx, &get).await.unwrap(), json!(100));
    }

    #[test]
    fn validation_rejects_unknown_ops() {
        assert!(VariableExecutor
            .validate(&node(json!({"id": "n", "data": {"var_name": "x", "var_op": "swap"}})))
            .is_err());
        assert!(AccumulatorExecutor
            .validate(&node(json!({"id": "n", "data": {"accum_op": "avg"}})))
            .is_err());
        assert!(CounterExecutor
            .validate(&node(json!({"id": "n", "data": {"counter_op": "double"}})))
            .is_err());
    }
}
