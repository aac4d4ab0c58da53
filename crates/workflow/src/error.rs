//! Validation and graph errors.

use serde::Serialize;

/// One structural problem found while validating a payload.
///
/// Issues are accumulated so a caller sees every problem at once instead
/// of fixing them one build at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Dotted path of the offending field (`nodes[3].id`, `edges[0].target`).
    pub field: String,
    /// Node the issue belongs to, when one is identifiable.
    pub node_id: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl ValidationIssue {
    /// Issue not attached to a specific node.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            node_id: None,
            message: message.into(),
        }
    }

    /// Issue attached to a node.
    pub fn for_node(
        field: impl Into<String>,
        node_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            node_id: Some(node_id.into()),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.node_id {
            Some(id) => write!(f, "{}: {} (node `{id}`)", self.field, self.message),
            None => write!(f, "{}: {}", self.field, self.message),
        }
    }
}

/// Failure while building or partitioning a workflow graph.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkflowError {
    /// One or more structural problems in the payload.
    #[error("invalid workflow: {}", format_issues(.0))]
    Validation(Vec<ValidationIssue>),

    /// The graph contains a cycle; the listed nodes could not be assigned
    /// a level.
    #[error("cycle detected involving nodes [{}]", .nodes.join(", "))]
    Cycle {
        /// Nodes left unassigned by the partitioner, sorted by id.
        nodes: Vec<String>,
    },
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
