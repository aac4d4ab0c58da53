//! Execution results.

use std::collections::BTreeMap;
use std::time::Duration;

use lattice_core::ErrorClass;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::status::ExecutionStatus;

/// Outcome of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NodeResult {
    /// The node produced a value.
    Success {
        /// The produced value.
        value: Value,
    },
    /// The node failed.
    Failure {
        /// Error description.
        error: String,
    },
}

impl NodeResult {
    /// The value, for successful nodes.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Success { value } => Some(value),
            Self::Failure { .. } => None,
        }
    }
}

/// One recorded failure, classified per the error taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionFailure {
    /// Node that failed, when the failure is node-scoped.
    pub node_id: Option<String>,
    /// Taxonomy class.
    pub class: ErrorClass,
    /// Human-readable description.
    pub message: String,
}

/// The structured result of one `execute` call.
///
/// Node results are keyed by node id in a sorted map so two runs of the
/// same deterministic workflow serialize identically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Fresh identifier of this run.
    pub execution_id: Uuid,
    /// Identifier of the stored workflow, when one was used.
    pub workflow_id: Option<Uuid>,
    /// Terminal status.
    pub status: ExecutionStatus,
    /// Per-node outcomes.
    pub node_results: BTreeMap<String, NodeResult>,
    /// Value of the first terminal node in sorted-id order, null if none.
    pub final_output: Value,
    /// Failures recorded before the run stopped; empty on success.
    pub errors: Vec<ExecutionFailure>,
    /// Total wall-clock duration.
    pub duration: Duration,
}

impl ExecutionResult {
    /// True when the run completed without failures.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// A successful node's value.
    #[must_use]
    pub fn node_value(&self, node_id: &str) -> Option<&Value> {
        self.node_results.get(node_id).and_then(NodeResult::value)
    }

    /// The first recorded failure.
    #[must_use]
    pub fn first_error(&self) -> Option<&ExecutionFailure> {
        self.errors.first()
    }
}
