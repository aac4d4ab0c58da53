//! Pre-execution engine failures.
//!
//! Failures inside a running workflow are reported through
//! [`ExecutionResult::errors`](crate::result::ExecutionResult); this type
//! covers everything that prevents a run from starting.

use lattice_core::{ErrorClass, LimitError};
use lattice_egress::EgressError;
use lattice_workflow::{StoreError, WorkflowError};

/// Failure raised before any node executes.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The payload failed validation or graph construction.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// A pre-execution limit was breached (payload size).
    #[error(transparent)]
    Limit(#[from] LimitError),

    /// The HTTP client pool could not be built.
    #[error(transparent)]
    Egress(#[from] EgressError),

    /// A stored workflow could not be loaded.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Taxonomy class of this failure.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Workflow(WorkflowError::Validation(_)) | Self::Store(_) => ErrorClass::Validation,
            Self::Workflow(WorkflowError::Cycle { .. }) => ErrorClass::Graph,
            Self::Limit(_) => ErrorClass::Limit,
            Self::Egress(e) => e.class(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_workflow::ValidationIssue;

    #[test]
    fn classes() {
        let err = EngineError::Workflow(WorkflowError::Validation(vec![ValidationIssue::new(
            "nodes",
            "workflow has no nodes",
        )]));
        assert_eq!(err.class(), ErrorClass::Validation);

        let err = EngineError::Workflow(WorkflowError::Cycle { nodes: vec!["b".into()] });
        assert_eq!(err.class(), ErrorClass::Graph);

        let err = EngineError::Limit(LimitError::PayloadTooLarge { size: 10, limit: 1 });
        assert_eq!(err.class(), ErrorClass::Limit);
    }
}
