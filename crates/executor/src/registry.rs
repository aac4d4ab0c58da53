//! Kind → executor dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use lattice_workflow::NodeKind;

use crate::builtins;
use crate::error::ExecutorError;
use crate::executor::Executor;

/// Registry mapping node kinds to their executors.
///
/// The engine populates this at construction and consults it both at
/// validation time (unregistered kinds fail the build) and per node at
/// execution time. Registering a kind twice fails: built-ins stay
/// replace-proof, and typos in custom registrations surface early.
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: HashMap<NodeKind, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with every built-in kind.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for executor in builtins::all() {
            registry
                .register(executor)
                .expect("built-in kinds are distinct");
        }
        registry
    }

    /// Add an executor under its own kind tag.
    pub fn register(&mut self, executor: Arc<dyn Executor>) -> Result<(), ExecutorError> {
        let kind = executor.kind();
        if self.executors.contains_key(&kind) {
            return Err(ExecutorError::DuplicateKind(kind.as_str().to_owned()));
        }
        self.executors.insert(kind, executor);
        Ok(())
    }

    /// Look up the executor for `kind`.
    #[must_use]
    pub fn get(&self, kind: &NodeKind) -> Option<&Arc<dyn Executor>> {
        self.executors.get(kind)
    }

    /// True when `kind` is registered.
    #[must_use]
    pub fn contains(&self, kind: &NodeKind) -> bool {
        self.executors.contains_key(kind)
    }

    /// Registered kind tags, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.executors.keys().map(NodeKind::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Number of registered kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.executors.len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
