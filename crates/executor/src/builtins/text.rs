//! Text constant and string-operation nodes.

use async_trait::async_trait;
use lattice_core::LimitError;
use lattice_workflow::{Node, NodeKind};
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::ExecutorError;
use crate::executor::Executor;

const TEXT_OPS: [&str; 10] = [
    "uppercase",
    "lowercase",
    "trim",
    "reverse",
    "title_case",
    "word_count",
    "char_count",
    "split",
    "join",
    "repeat",
];

/// Emits the configured (already interpolated) `text`.
pub struct TextExecutor;

#[async_trait]
impl Executor for TextExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::Text
    }

    fn validate(&self, node: &Node) -> Result<(), ExecutorError> {
        if node.data.str_field("text").is_none() {
            return Err(ExecutorError::Config(
                "text node requires a string `text` field".into(),
            ));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &ExecutionContext, node: &Node) -> Result<Value, ExecutorError> {
        ctx.count_node_execution()?;
        let text = node
            .data
            .str_field("text")
            .ok_or_else(|| ExecutorError::Config("text node requires a string `text` field".into()))?;
        Ok(Value::String(text.to_owned()))
    }
}

/// Applies a string operation to the predecessor input.
pub struct TextOpExecutor;

#[async_trait]
impl Executor for TextOpExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::TextOp
    }

    fn validate(&self, node: &Node) -> Result<(), ExecutorError> {
        match node.data.str_field("text_op") {
            None => Err(ExecutorError::Config(
                "text_op node requires a `text_op` field".into(),
            )),
            Some(op) if TEXT_OPS.contains(&op) => Ok(()),
            Some(op) => Err(ExecutorError::Config(format!(
                "unsupported text op `{op}`"
            ))),
        }
    }

    async fn execute(&self, ctx: &ExecutionContext, node: &Node) -> Result<Value, ExecutorError> {
        ctx.count_node_execution()?;
        let op = node
            .data
            .str_field("text_op")
            .ok_or_else(|| ExecutorError::Config("text_op node requires a `text_op` field".into()))?;
        let separator = node.data.str_field("separator").unwrap_or(",");
        let input = ctx
            .first_input(&node.id)?
            .ok_or_else(|| ExecutorError::Execution("text_op node has no input".into()))?;

        // `join` consumes an array; every other op consumes a string.
        if op == "join" {
            let items = input.as_array().ok_or_else(|| ExecutorError::TypeMismatch {
                expected: "array".into(),
                found: value_kind(&input).into(),
            })?;
            let parts: Vec<String> = items.iter().map(stringify).collect();
            return Ok(Value::String(parts.join(separator)));
        }

        let text = input.as_str().ok_or_else(|| ExecutorError::TypeMismatch {
            expected: "string".into(),
            found: value_kind(&input).into(),
        })?;

        let out = match op {
            "uppercase" => Value::String(text.to_uppercase()),
            "lowercase" => Value::String(text.to_lowercase()),
            "trim" => Value::String(text.trim().to_owned()),
            "reverse" => Value::String(text.chars().rev().collect()),
            "title_case" => Value::String(title_case(text)),
            "word_count" => Value::from(text.split_whitespace().count()),
            "char_count" => Value::from(text.chars().count()),
            "split" => Value::Array(
                text.split(separator)
                    .map(|part| Value::String(part.to_owned()))
                    .collect(),
            ),
            "repeat" => {
                let n = node.data.u32_field("repeat_n").ok_or_else(|| {
                    ExecutorError::Config("repeat requires a numeric `repeat_n` field".into())
                })?;
                let limit = ctx.limits().max_iterations;
                if n > limit {
                    return Err(ExecutorError::Limit(LimitError::Iterations {
                        observed: n,
                        limit,
                    }));
                }
                Value::String(text.repeat(n as usize))
            }
            other => {
                return Err(ExecutorError::Config(format!(
                    "unsupported text op `{other}`"
                )));
            }
        };
        Ok(out)
    }
}

/// Lowercase the whole string, then capitalize each alphabetic word
/// start. The single canonical title-casing algorithm.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
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
                {"id": "op", "data": {"text_op": "trim"}}
            ],
            "edges": [{"source": "src", "target": "op"}]
        }));
        ctx.store_output("src", input).unwrap();
        ctx
    }

    async fn run(ctx: &ExecutionContext, data: Value) -> Result<Value, ExecutorError> {
        let n = node(json!({"id": "op", "data": data}));
        TextOpExecutor.execute(ctx, &n).await
    }

    #[tokio::test]
    async fn text_node_emits_its_text() {
        let ctx = piped_ctx(json!(null));
        let n = node(json!({"id": "t", "data": {"text": "hello"}}));
        assert_eq!(TextExecutor.execute(&ctx, &n).await.unwrap(), json!("hello"));
    }

    #[tokio::test]
    async fn case_and_trim_ops() {
        let ctx = piped_ctx(json!("  Mixed Case  "));
        assert_eq!(
            run(&ctx, json!({"text_op": "trim"})).await.unwrap(),
            json!("Mixed Case")
        );

        let ctx = piped_ctx(json!("abc"));
        assert_eq!(
            run(&ctx, json!({"text_op": "uppercase"})).await.unwrap(),
            json!("ABC")
        );
        assert_eq!(
            run(&ctx, json!({"text_op": "reverse"})).await.unwrap(),
            json!("cba")
        );
    }

    #[tokio::test]
    async fn title_case_lowercases_then_capitalizes() {
        let ctx = piped_ctx(json!("heLLo WORLD of dags"));
        assert_eq!(
            run(&ctx, json!({"text_op": "title_case"})).await.unwrap(),
            json!("Hello World Of Dags")
        );
    }

    #[tokio::test]
    async fn counting_ops() {
        let ctx = piped_ctx(json!("one two  three"));
        assert_eq!(
            run(&ctx, json!({"text_op": "word_count"})).await.unwrap(),
            json!(3)
        );
        let ctx = piped_ctx(json!("héllo"));
        assert_eq!(
            run(&ctx, json!({"text_op": "char_count"})).await.unwrap(),
            json!(5)
        );
    }

    #[tokio::test]
    async fn split_and_join_with_separator() {
        let ctx = piped_ctx(json!("a|b|c"));
        assert_eq!(
            run(&ctx, json!({"text_op": "split", "separator": "|"})).await.unwrap(),
            json!(["a", "b", "c"])
        );

        let ctx = piped_ctx(json!(["a", "b", 3]));
        assert_eq!(
            run(&ctx, json!({"text_op": "join", "separator": "-"})).await.unwrap(),
            json!("a-b-3")
        );
    }

    #[tokio::test]
    async fn repeat_is_bounded_by_max_iterations() {
        let ctx = piped_ctx(json!("ab"));
        assert_eq!(
            run(&ctx, json!({"text_op": "repeat", "repeat_n": 3})).await.unwrap(),
            json!("ababab")
        );

        let big = u64::from(ctx.limits().max_iterations) + 1;
        let err = run(&ctx, json!({"text_op": "repeat", "repeat_n": big}))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Limit(LimitError::Iterations { .. })));
    }

    #[tokio::test]
    async fn non_string_input_is_a_type_mismatch() {
        let ctx = piped_ctx(json!(42));
        let err = run(&ctx, json!({"text_op": "trim"})).await.unwrap_err();
        assert!(matches!(err, ExecutorError::TypeMismatch { .. }));
    }

    #[test]
    fn validate_rejects_unknown_op() {
        let n = node(json!({"id": "op", "data": {"text_op": "rot13"}}));
        assert!(TextOpExecutor.validate(&n).is_err());
    }
}
