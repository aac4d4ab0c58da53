//! Get-or-store node over the execution cache.

use std::time::Duration;

use async_trait::async_trait;
use lattice_workflow::{Node, NodeKind};
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::ExecutorError;
use crate::executor::Executor;

/// Returns the fresh cached value under `cache_key`, or stores the input
/// (with `timeout` seconds of TTL) and returns it.
pub struct CacheExecutor;

#[async_trait]
impl Executor for CacheExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::Cache
    }

    fn validate(&self, node: &Node) -> Result<(), ExecutorError> {
        if node.data.str_field("cache_key").is_none_or(str::is_empty) {
            return Err(ExecutorError::Config(
                "cache node requires a non-empty `cache_key` field".into(),
            ));
        }
        if let Some(ttl) = node.data.num_field("timeout") {
            if ttl < 0.0 {
                return Err(ExecutorError::Config("cache `timeout` is negative".into()));
            }
        }
        Ok(())
    }

    async fn execute(&self, ctx: &ExecutionContext, node: &Node) -> Result<Value, ExecutorError> {
        ctx.count_node_execution()?;
        let key = node
            .data
            .str_field("cache_key")
            .ok_or_else(|| ExecutorError::Config("cache node requires a `cache_key` field".into()))?;

        if let Some(hit) = ctx.cache_get(key) {
            tracing::debug!(node_id = %node.id, %key, "cache hit");
            return Ok(hit);
        }

        let value = match ctx.first_input(&node.id)? {
            Some(input) => input,
            None => node.data.get("value").cloned().ok_or_else(|| {
                ExecutorError::Execution(
                    "cache node needs an input edge or a `value` field to store".into(),
                )
            })?,
        };
        let ttl = node
            .data
            .num_field("timeout")
            .map(Duration::from_secs_f64);
        ctx.cache_put(key, value.clone(), ttl)?;
        Ok(value)
    }
}
