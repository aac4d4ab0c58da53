//! Per-execution scratch state and the protection counters.
//!
//! One context is created per `execute` call and dropped when it
//! returns. Node outputs live in a concurrent map written by the
//! scheduler; variables, the accumulator, the counter, and the cache are
//! execution-scoped and guarded by the value validator on every write.
//! Writes from concurrent peers on the same level are each internally
//! consistent but unordered relative to each other.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use lattice_core::{Limits, LimitError, ValueGuard};
use lattice_egress::ClientPool;
use lattice_workflow::DependencyGraph;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::ExecutorError;

/// Entries kept by the execution cache before LRU eviction.
const CACHE_CAPACITY: usize = 128;

struct CacheEntry {
    value: Value,
    expires_at: Option<Instant>,
}

/// Scratch state owned by exactly one workflow execution.
pub struct ExecutionContext {
    /// Fresh identifier for this run.
    pub execution_id: Uuid,
    /// Identifier of the stored workflow, when one was used.
    pub workflow_id: Option<Uuid>,
    /// Cancellation signal shared by every worker.
    pub cancellation: CancellationToken,
    /// Absolute deadline derived from `max_execution_time`.
    pub deadline: Instant,

    limits: Arc<Limits>,
    guard: ValueGuard,
    graph: Arc<DependencyGraph>,
    http: Option<Arc<ClientPool>>,

    outputs: DashMap<String, Value>,
    variables: RwLock<serde_json::Map<String, Value>>,
    accumulator: RwLock<Option<Value>>,
    counter: RwLock<f64>,
    cache: Mutex<LruCache<String, CacheEntry>>,
    context_vars: RwLock<serde_json::Map<String, Value>>,
    context_consts: RwLock<serde_json::Map<String, Value>>,

    node_executions: AtomicU32,
    http_calls: AtomicU32,
}

impl ExecutionContext {
    /// Context for one run of the given graph.
    #[must_use]
    pub fn new(limits: Arc<Limits>, graph: Arc<DependencyGraph>, http: Option<Arc<ClientPool>>) -> Self {
        let guard = ValueGuard::new(&limits);
        let deadline = Instant::now() + limits.max_execution_time;
        Self {
            execution_id: Uuid::new_v4(),
            workflow_id: None,
            cancellation: CancellationToken::new(),
            deadline,
            limits,
            guard,
            graph,
            http,
            outputs: DashMap::new(),
            variables: RwLock::new(serde_json::Map::new()),
            accumulator: RwLock::new(None),
            counter: RwLock::new(0.0),
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(CACHE_CAPACITY).expect("cache capacity is non-zero"),
            )),
            context_vars: RwLock::new(serde_json::Map::new()),
            context_consts: RwLock::new(serde_json::Map::new()),
            node_executions: AtomicU32::new(0),
            http_calls: AtomicU32::new(0),
        }
    }

    /// Attach the id of the stored workflow this run came from.
    #[must_use]
    pub fn with_workflow_id(mut self, workflow_id: Uuid) -> Self {
        self.workflow_id = Some(workflow_id);
        self
    }

    /// Replace the cancellation token with a shared one.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// The limits governing this execution.
    #[must_use]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// The dependency graph being executed.
    #[must_use]
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// The HTTP client pool, when the engine was built with one.
    #[must_use]
    pub fn http(&self) -> Option<&Arc<ClientPool>> {
        self.http.as_ref()
    }

    // --- protection counters -------------------------------------------

    /// Count one node execution against `max_node_executions`.
    ///
    /// Executors call this before doing any work; the post-increment
    /// value exceeding the cap aborts the node.
    pub fn count_node_execution(&self) -> Result<(), LimitError> {
        let observed = self.node_executions.fetch_add(1, Ordering::SeqCst) + 1;
        if observed > self.limits.max_node_executions {
            return Err(LimitError::NodeExecutions {
                observed,
                limit: self.limits.max_node_executions,
            });
        }
        Ok(())
    }

    /// Count one HTTP call against `max_http_calls_per_exec`.
    ///
    /// A limit of `0` forbids HTTP outright; [`Limits::UNLIMITED_HTTP_CALLS`]
    /// lifts the cap.
    pub fn count_http_call(&self) -> Result<(), LimitError> {
        let limit = self.limits.max_http_calls_per_exec;
        let observed = self.http_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if limit != Limits::UNLIMITED_HTTP_CALLS && observed > limit {
            return Err(LimitError::HttpCalls { observed, limit });
        }
        Ok(())
    }

    /// Node executions counted so far.
    #[must_use]
    pub fn node_execution_count(&self) -> u32 {
        self.node_executions.load(Ordering::SeqCst)
    }

    /// HTTP calls counted so far.
    #[must_use]
    pub fn http_call_count(&self) -> u32 {
        self.http_calls.load(Ordering::SeqCst)
    }

    // --- cancellation and deadline -------------------------------------

    /// Error out when the shared cancellation token has fired or the
    /// deadline has passed. Executors call this between suspension points.
    pub fn check_interrupted(&self) -> Result<(), ExecutorError> {
        if self.cancellation.is_cancelled() {
            return Err(ExecutorError::Cancelled);
        }
        if Instant::now() >= self.deadline {
            return Err(ExecutorError::DeadlineElapsed);
        }
        Ok(())
    }

    /// Time left before the deadline, zero when already past it.
    #[must_use]
    pub fn deadline_remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    // --- node outputs ---------------------------------------------------

    /// Store a node's output after guarding it.
    pub fn store_output(&self, node_id: &str, value: Value) -> Result<(), LimitError> {
        self.guard.check(&value)?;
        self.outputs.insert(node_id.to_owned(), value);
        Ok(())
    }

    /// A stored node output.
    #[must_use]
    pub fn output(&self, node_id: &str) -> Option<Value> {
        self.outputs.get(node_id).map(|entry| entry.value().clone())
    }

    /// Snapshot of every stored output.
    #[must_use]
    pub fn outputs(&self) -> Vec<(String, Value)> {
        self.outputs
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Outputs of a node's predecessors, in edge-declaration order.
    ///
    /// Multi-edges yield one entry per edge. A predecessor without an
    /// output (it did not run, or produced nothing) is a hard error.
    pub fn inputs_for(&self, node_id: &str) -> Result<Vec<Value>, ExecutorError> {
        self.graph
            .predecessors(node_id)
            .iter()
            .map(|pred| {
                self.output(pred)
                    .ok_or_else(|| ExecutorError::MissingInput(pred.clone()))
            })
            .collect()
    }

    /// First predecessor output, when the node has any predecessor.
    pub fn first_input(&self, node_id: &str) -> Result<Option<Value>, ExecutorError> {
        match self.graph.predecessors(node_id).first() {
            None => Ok(None),
            Some(pred) => self
                .output(pred)
                .map(Some)
                .ok_or_else(|| ExecutorError::MissingInput(pred.clone())),
        }
    }

    // --- variables ------------------------------------------------------

    /// Set a variable, guarding the value and the `max_variables` cap.
    pub fn set_variable(&self, name: &str, value: Value) -> Result<(), LimitError> {
        self.guard.check(&value)?;
        let mut vars = self.variables.write();
        if !vars.contains_key(name) && vars.len() >= self.limits.max_variables {
            return Err(LimitError::Variables {
                observed: vars.len() + 1,
                limit: self.limits.max_variables,
            });
        }
        vars.insert(name.to_owned(), value);
        Ok(())
    }

    /// Read a variable.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<Value> {
        self.variables.read().get(name).cloned()
    }

    /// Remove a variable, returning the previous value.
    pub fn remove_variable(&self, name: &str) -> Option<Value> {
        self.variables.write().remove(name)
    }

    // --- accumulator and counter ---------------------------------------

    /// Current accumulator value.
    #[must_use]
    pub fn accumulator(&self) -> Option<Value> {
        self.accumulator.read().clone()
    }

    /// Replace the accumulator, guarding the value.
    pub fn set_accumulator(&self, value: Value) -> Result<(), LimitError> {
        self.guard.check(&value)?;
        *self.accumulator.write() = Some(value);
        Ok(())
    }

    /// Current counter value.
    #[must_use]
    pub fn counter(&self) -> f64 {
        *self.counter.read()
    }

    /// Replace the counter.
    pub fn set_counter(&self, value: f64) {
        *self.counter.write() = value;
    }

    // --- cache ----------------------------------------------------------

    /// Fresh cache entry for `key`; expired entries are dropped.
    #[must_use]
    pub fn cache_get(&self, key: &str) -> Option<Value> {
        let mut cache = self.cache.lock();
        match cache.get(key) {
            Some(entry) if entry.expires_at.is_none_or(|t| Instant::now() < t) => {
                Some(entry.value.clone())
            }
            Some(_) => {
                cache.pop(key);
                None
            }
            None => None,
        }
    }

    /// Store a cache entry with an optional TTL, guarding the value.
    pub fn cache_put(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), LimitError> {
        self.guard.check(&value)?;
        self.cache.lock().put(
            key.to_owned(),
            CacheEntry {
                value,
                expires_at: ttl.map(|t| Instant::now() + t),
            },
        );
        Ok(())
    }

    // --- template scopes ------------------------------------------------

    /// Seed an interpolation variable (context-variable root nodes).
    pub fn set_context_variable(&self, name: &str, value: Value) -> Result<(), LimitError> {
        self.guard.check(&value)?;
        self.context_vars.write().insert(name.to_owned(), value);
        Ok(())
    }

    /// Seed an interpolation constant (context-constant root nodes).
    pub fn set_context_constant(&self, name: &str, value: Value) -> Result<(), LimitError> {
        self.guard.check(&value)?;
        self.context_consts.write().insert(name.to_owned(), value);
        Ok(())
    }

    /// Look up `{{ variable.name }}` / `{{ const.name }}` sources.
    #[must_use]
    pub fn template_value(&self, scope: &str, name: &str) -> Option<Value> {
        match scope {
            "variable" => self.context_vars.read().get(name).cloned(),
            "const" => self.context_consts.read().get(name).cloned(),
            _ => None,
        }
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("execution_id", &self.execution_id)
            .field("workflow_id", &self.workflow_id)
            .field("node_executions", &self.node_execution_count())
            .field("http_calls", &self.http_call_count())
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}
