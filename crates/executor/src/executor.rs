//! The per-kind executor contract.

use async_trait::async_trait;
use lattice_workflow::{Node, NodeKind};
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::ExecutorError;

/// One node kind's implementation.
///
/// Contract:
///
/// - [`validate`](Executor::validate) statically checks a node's
///   configuration at graph-build time, before anything runs.
/// - [`execute`](Executor::execute) **must** call
///   [`ExecutionContext::count_node_execution`] before doing any work,
///   and HTTP-capable executors **must** call
///   [`ExecutionContext::count_http_call`] before issuing a request.
/// - Long-running executors check
///   [`ExecutionContext::check_interrupted`] between suspension points.
#[async_trait]
pub trait Executor: Send + Sync {
    /// The kind tag this executor implements.
    fn kind(&self) -> NodeKind;

    /// Statically check `node`'s configuration.
    fn validate(&self, node: &Node) -> Result<(), ExecutorError>;

    /// Run the node against the execution context.
    async fn execute(&self, ctx: &ExecutionContext, node: &Node) -> Result<Value, ExecutorError>;
}
