//! The engine facade and the level-based scheduler.
//!
//! Execution processes the level partition in order. Within a level,
//! nodes run concurrently up to the configured bound, gated by a
//! semaphore; a single-node level runs inline to skip the worker-spawn
//! overhead. The first failure arms the shared cancellation token so
//! sibling workers abort at their next checkpoint, the level join drains
//! every spawned worker, and later levels never start.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use lattice_core::{Limits, LimitError};
use lattice_egress::ClientPool;
use lattice_executor::{template, ExecutionContext, Executor, ExecutorError, ExecutorRegistry};
use lattice_telemetry::{ExecutionEvent, Observer, ObserverBus};
use lattice_workflow::{
    DependencyGraph, Node, ValidationIssue, WorkflowError, WorkflowPayload, WorkflowStore,
};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::EngineError;
use crate::result::{ExecutionFailure, ExecutionResult, NodeResult};
use crate::status::ExecutionStatus;

/// A failure that stopped the run: the failing node (when known) and the
/// error itself.
type LevelFailure = (Option<String>, ExecutorError);

/// The workflow execution engine.
///
/// Owns the engine-lifetime pieces: limits, the executor registry, the
/// observer bus, and the HTTP client pool. Each `execute` call builds a
/// fresh [`ExecutionContext`] that is dropped when the call returns.
pub struct Engine {
    limits: Arc<Limits>,
    registry: Arc<ExecutorRegistry>,
    observers: Arc<ObserverBus>,
    http: Arc<ClientPool>,
}

impl Engine {
    /// Engine with the built-in executor catalogue.
    pub fn new(limits: Limits) -> Result<Self, EngineError> {
        Self::with_registry(limits, ExecutorRegistry::with_builtins())
    }

    /// Engine with a caller-assembled registry.
    pub fn with_registry(limits: Limits, registry: ExecutorRegistry) -> Result<Self, EngineError> {
        let http = Arc::new(ClientPool::new(&limits)?);
        Ok(Self {
            limits: Arc::new(limits),
            registry: Arc::new(registry),
            observers: Arc::new(ObserverBus::new()),
            http,
        })
    }

    /// The limits this engine enforces.
    #[must_use]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// The executor registry.
    #[must_use]
    pub fn registry(&self) -> &ExecutorRegistry {
        &self.registry
    }

    /// The observer bus.
    #[must_use]
    pub fn observers(&self) -> &ObserverBus {
        &self.observers
    }

    /// Attach an observer for the engine's lifetime. Events from
    /// concurrent executions on the same engine interleave.
    pub fn register_observer(&self, observer: Arc<dyn Observer>) {
        self.observers.register(observer);
    }

    /// Execute `payload` with intra-level parallelism.
    pub async fn execute(&self, payload: &WorkflowPayload) -> Result<ExecutionResult, EngineError> {
        self.run(payload, None, true, None).await
    }

    /// Execute `payload` strictly one node at a time, in the same
    /// topological order. Single-writer semantics for stateful nodes.
    pub async fn execute_sequential(
        &self,
        payload: &WorkflowPayload,
    ) -> Result<ExecutionResult, EngineError> {
        self.run(payload, None, false, None).await
    }

    /// Execute with a host-controlled cancellation token.
    pub async fn execute_with_cancellation(
        &self,
        payload: &WorkflowPayload,
        token: CancellationToken,
    ) -> Result<ExecutionResult, EngineError> {
        self.run(payload, None, true, Some(token)).await
    }

    /// Execute a workflow registered in `store`; the result carries the
    /// store's workflow id.
    pub async fn execute_stored(
        &self,
        store: &WorkflowStore,
        workflow_id: Uuid,
    ) -> Result<ExecutionResult, EngineError> {
        let data = store.get(workflow_id)?;
        let payload: WorkflowPayload = serde_json::from_str(&data)
            .map_err(lattice_workflow::StoreError::InvalidPayload)?;
        self.run(&payload, Some(workflow_id), true, None).await
    }

    async fn run(
        &self,
        payload: &WorkflowPayload,
        workflow_id: Option<Uuid>,
        parallel: bool,
        token: Option<CancellationToken>,
    ) -> Result<ExecutionResult, EngineError> {
        let payload_bytes = serde_json::to_vec(payload).map(|b| b.len()).unwrap_or(0);
        if payload_bytes > self.limits.max_payload_size {
            return Err(LimitError::PayloadTooLarge {
                size: payload_bytes,
                limit: self.limits.max_payload_size,
            }
            .into());
        }

        let graph = Arc::new(DependencyGraph::from_payload(payload, &self.limits)?);
        self.validate_nodes(payload)?;
        let levels = graph.compute_levels()?;

        let mut ctx =
            ExecutionContext::new(Arc::clone(&self.limits), Arc::clone(&graph), Some(Arc::clone(&self.http)));
        if let Some(id) = workflow_id {
            ctx = ctx.with_workflow_id(id);
        }
        if let Some(token) = token {
            ctx = ctx.with_cancellation(token);
        }
        let ctx = Arc::new(ctx);

        let parallel = parallel && self.limits.enable_parallel;
        let started = Instant::now();
        tracing::info!(
            execution_id = %ctx.execution_id,
            nodes = graph.node_count(),
            levels = levels.len(),
            parallel,
            "execution started"
        );
        self.observers.emit(ExecutionEvent::WorkflowStart {
            execution_id: ctx.execution_id,
            workflow_id: ctx.workflow_id,
            at: Utc::now(),
            metadata: serde_json::Map::new(),
        });

        let outcome = tokio::time::timeout(
            self.limits.max_execution_time,
            self.run_levels(&ctx, &levels, parallel),
        )
        .await;
        let duration = started.elapsed();

        let (status, errors) = match outcome {
            Ok(None) => (ExecutionStatus::Completed, Vec::new()),
            Ok(Some((node_id, error))) => {
                let status = match error {
                    ExecutorError::Cancelled => ExecutionStatus::Cancelled,
                    ExecutorError::DeadlineElapsed => ExecutionStatus::TimedOut,
                    _ => ExecutionStatus::Failed,
                };
                let failure = ExecutionFailure {
                    node_id,
                    class: error.class(),
                    message: error.to_string(),
                };
                (status, vec![failure])
            }
            Err(_) => {
                // Hard stop: in-flight workers are aborted with the level
                // join, and the token is armed for anything still holding it.
                ctx.cancellation.cancel();
                let failure = ExecutionFailure {
                    node_id: None,
                    class: lattice_core::ErrorClass::Timeout,
                    message: format!(
                        "execution deadline elapsed after {:?}",
                        self.limits.max_execution_time
                    ),
                };
                (ExecutionStatus::TimedOut, vec![failure])
            }
        };

        let mut node_results: BTreeMap<String, NodeResult> = ctx
            .outputs()
            .into_iter()
            .map(|(id, value)| (id, NodeResult::Success { value }))
            .collect();
        for failure in &errors {
            if let Some(id) = &failure.node_id {
                node_results.insert(
                    id.clone(),
                    NodeResult::Failure {
                        error: failure.message.clone(),
                    },
                );
            }
        }

        // The first terminal in sorted-id order is the one and only
        // source of the final output; if it produced nothing, the final
        // output is null even when a later terminal succeeded.
        let final_output = graph
            .terminal_nodes()
            .first()
            .and_then(|id| ctx.output(id))
            .unwrap_or(Value::Null);

        tracing::info!(execution_id = %ctx.execution_id, %status, ?duration, "execution finished");
        self.observers.emit(ExecutionEvent::WorkflowEnd {
            execution_id: ctx.execution_id,
            workflow_id: ctx.workflow_id,
            status: status.to_string(),
            duration,
            error: errors.first().map(|f| f.message.clone()),
            at: Utc::now(),
            metadata: serde_json::Map::new(),
        });

        Ok(ExecutionResult {
            execution_id: ctx.execution_id,
            workflow_id: ctx.workflow_id,
            status,
            node_results,
            final_output,
            errors,
            duration,
        })
    }

    /// Resolve every node's kind against the registry and statically
    /// validate its configuration, accumulating all issues.
    fn validate_nodes(&self, payload: &WorkflowPayload) -> Result<(), EngineError> {
        let mut issues = Vec::new();
        for (index, node) in payload.nodes.iter().enumerate() {
            let Some(kind) = node.resolved_kind() else {
                issues.push(ValidationIssue::for_node(
                    format!("nodes[{index}].type"),
                    &node.id,
                    "node kind is neither declared nor inferable from data fields",
                ));
                continue;
            };
            let Some(executor) = self.registry.get(&kind) else {
                issues.push(ValidationIssue::for_node(
                    format!("nodes[{index}].type"),
                    &node.id,
                    format!("unknown node kind `{kind}`"),
                ));
                continue;
            };
            if let Err(error) = executor.validate(node) {
                issues.push(ValidationIssue::for_node(
                    format!("nodes[{index}].data"),
                    &node.id,
                    error.to_string(),
                ));
            }
        }
        if issues.is_empty() {
            Ok(())
        } else {
            Err(WorkflowError::Validation(issues).into())
        }
    }

    /// Drive the levels in order; the first failure stops the run.
    async fn run_levels(
        &self,
        ctx: &Arc<ExecutionContext>,
        levels: &[Vec<String>],
        parallel: bool,
    ) -> Option<LevelFailure> {
        for level in levels {
            if ctx.cancellation.is_cancelled() {
                return Some((None, ExecutorError::Cancelled));
            }
            let failure = if parallel && level.len() > 1 && self.limits.max_concurrency != 1 {
                self.run_level_parallel(ctx, level).await
            } else {
                self.run_level_sequential(ctx, level).await
            };
            if let Some(failure) = failure {
                ctx.cancellation.cancel();
                return Some(failure);
            }
        }
        None
    }

    /// Run a level on the caller's task, one node at a time.
    async fn run_level_sequential(
        &self,
        ctx: &Arc<ExecutionContext>,
        level: &[String],
    ) -> Option<LevelFailure> {
        for node_id in level {
            if let Err(error) = ctx.check_interrupted() {
                return Some((None, error));
            }
            if let Err(error) = run_node(
                Arc::clone(ctx),
                Arc::clone(&self.registry),
                Arc::clone(&self.observers),
                node_id.clone(),
            )
            .await
            {
                return Some((Some(node_id.clone()), error));
            }
        }
        None
    }

    /// Fan a level out to workers under the concurrency bound.
    ///
    /// Each worker checks cancellation, acquires a semaphore slot,
    /// re-checks, then runs its node. The join drains every worker before
    /// the level resolves, and the first real failure wins over the
    /// cancellations it caused in siblings.
    async fn run_level_parallel(
        &self,
        ctx: &Arc<ExecutionContext>,
        level: &[String],
    ) -> Option<LevelFailure> {
        let permits = if self.limits.max_concurrency == 0 {
            level.len()
        } else {
            self.limits.max_concurrency.min(level.len())
        };
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut workers: JoinSet<(String, Result<(), ExecutorError>)> = JoinSet::new();

        for node_id in level {
            let ctx = Arc::clone(ctx);
            let registry = Arc::clone(&self.registry);
            let observers = Arc::clone(&self.observers);
            let semaphore = Arc::clone(&semaphore);
            let node_id = node_id.clone();
            workers.spawn(async move {
                if ctx.cancellation.is_cancelled() {
                    return (node_id, Err(ExecutorError::Cancelled));
                }
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return (node_id, Err(ExecutorError::Cancelled)),
                };
                if let Err(error) = ctx.check_interrupted() {
                    return (node_id, Err(error));
                }
                let result = run_node(Arc::clone(&ctx), registry, observers, node_id.clone()).await;
                (node_id, result)
            });
        }

        let mut primary: Option<LevelFailure> = None;
        let mut interrupted: Option<LevelFailure> = None;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((node_id, Err(error))) => {
                    ctx.cancellation.cancel();
                    let slot = match error {
                        ExecutorError::Cancelled | ExecutorError::DeadlineElapsed => {
                            &mut interrupted
                        }
                        _ => &mut primary,
                    };
                    if slot.is_none() {
                        *slot = Some((Some(node_id), error));
                    }
                }
                Err(join_error) => {
                    ctx.cancellation.cancel();
                    tracing::error!(?join_error, "node worker panicked");
                    if primary.is_none() {
                        primary = Some((
                            None,
                            ExecutorError::Execution("node worker panicked".into()),
                        ));
                    }
                }
            }
        }
        primary.or(interrupted)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("kinds", &self.registry.kinds())
            .field("observers", &self.observers.observer_count())
            .finish_non_exhaustive()
    }
}

/// Execute one node: interpolate its configuration, dispatch through the
/// registry, store the guarded output, and emit node events.
async fn run_node(
    ctx: Arc<ExecutionContext>,
    registry: Arc<ExecutorRegistry>,
    observers: Arc<ObserverBus>,
    node_id: String,
) -> Result<(), ExecutorError> {
    let node = ctx
        .graph()
        .node(&node_id)
        .cloned()
        .ok_or_else(|| ExecutorError::Execution(format!("node `{node_id}` vanished from graph")))?;
    let kind = node
        .resolved_kind()
        .ok_or_else(|| ExecutorError::UnknownKind(node_id.clone()))?;
    let executor: Arc<dyn Executor> = registry
        .get(&kind)
        .cloned()
        .ok_or_else(|| ExecutorError::UnknownKind(kind.as_str().to_owned()))?;

    // Interpolation happens now, not at build time, so context values
    // seeded by earlier levels are visible.
    let node = Node {
        id: node.id,
        kind: Some(kind.clone()),
        data: template::interpolate_data(&node.data, &ctx),
    };

    observers.emit(ExecutionEvent::NodeStart {
        execution_id: ctx.execution_id,
        node_id: node_id.clone(),
        kind: kind.as_str().to_owned(),
        at: Utc::now(),
        metadata: serde_json::Map::new(),
    });
    let started = Instant::now();

    let outcome = match executor.execute(&ctx, &node).await {
        Ok(value) => ctx
            .store_output(&node_id, value.clone())
            .map(|()| value)
            .map_err(ExecutorError::from),
        Err(error) => Err(error),
    };
    let elapsed = started.elapsed();

    if elapsed > ctx.limits().max_node_execution_time {
        tracing::warn!(
            %node_id,
            ?elapsed,
            advisory = ?ctx.limits().max_node_execution_time,
            "node exceeded the advisory execution time"
        );
    }

    match outcome {
        Ok(value) => {
            tracing::debug!(%node_id, kind = kind.as_str(), ?elapsed, "node succeeded");
            observers.emit(ExecutionEvent::NodeSuccess {
                execution_id: ctx.execution_id,
                node_id,
                kind: kind.as_str().to_owned(),
                duration: elapsed,
                result: value,
                at: Utc::now(),
                metadata: serde_json::Map::new(),
            });
            Ok(())
        }
        Err(error) => {
            tracing::debug!(%node_id, kind = kind.as_str(), %error, "node failed");
            observers.emit(ExecutionEvent::NodeFailure {
                execution_id: ctx.execution_id,
                node_id,
                kind: kind.as_str().to_owned(),
                duration: elapsed,
                error: error.to_string(),
                at: Utc::now(),
                metadata: serde_json::Map::new(),
            });
            Err(error)
        }
    }
}
