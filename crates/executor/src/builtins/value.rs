//! Constant-value node.

use async_trait::async_trait;
use lattice_workflow::{Node, NodeKind};
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::ExecutorError;
use crate::executor::Executor;

/// Emits the configured `value` unchanged.
pub struct ValueExecutor;

#[async_trait]
impl Executor for ValueExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::Value
    }

    fn validate(&self, node: &Node) -> Result<(), ExecutorError> {
        if !node.data.has("value") {
            return Err(ExecutorError::Config(
                "value node requires a `value` field".into(),
            ));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &ExecutionContext, node: &Node) -> Result<Value, ExecutorError> {
        ctx.count_node_execution()?;
        Ok(node.data.get("value").cloned().unwrap_or(Value::Null))
    }
}
