//! Execution lifecycle events.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Execution lifecycle event.
///
/// Emitted by the engine as executions progress. Every variant carries
/// the execution id, a timestamp, and free-form metadata; node-scoped
/// variants add the node id and kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum ExecutionEvent {
    /// An execution has started.
    WorkflowStart {
        /// The execution identifier.
        execution_id: Uuid,
        /// The workflow identifier, when the payload came from the store.
        workflow_id: Option<Uuid>,
        /// Emission time.
        at: DateTime<Utc>,
        /// Free-form metadata.
        #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
        metadata: serde_json::Map<String, Value>,
    },
    /// An execution has finished, in any terminal state.
    WorkflowEnd {
        /// The execution identifier.
        execution_id: Uuid,
        /// The workflow identifier.
        workflow_id: Option<Uuid>,
        /// Terminal status tag (`completed`, `failed`, `timed_out`, ...).
        status: String,
        /// Total wall-clock duration.
        duration: Duration,
        /// First error, when the execution did not complete.
        error: Option<String>,
        /// Emission time.
        at: DateTime<Utc>,
        /// Free-form metadata.
        #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
        metadata: serde_json::Map<String, Value>,
    },
    /// A node is about to execute.
    NodeStart {
        /// The execution identifier.
        execution_id: Uuid,
        /// The node identifier.
        node_id: String,
        /// The node kind tag.
        kind: String,
        /// Emission time.
        at: DateTime<Utc>,
        /// Free-form metadata.
        #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
        metadata: serde_json::Map<String, Value>,
    },
    /// A node produced a value.
    NodeSuccess {
        /// The execution identifier.
        execution_id: Uuid,
        /// The node identifier.
        node_id: String,
        /// The node kind tag.
        kind: String,
        /// How long the node took.
        duration: Duration,
        /// The produced value.
        result: Value,
        /// Emission time.
        at: DateTime<Utc>,
        /// Free-form metadata.
        #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
        metadata: serde_json::Map<String, Value>,
    },
    /// A node failed.
    NodeFailure {
        /// The execution identifier.
        execution_id: Uuid,
        /// The node identifier.
        node_id: String,
        /// The node kind tag.
        kind: String,
        /// How long the node ran before failing.
        duration: Duration,
        /// Error description.
        error: String,
        /// Emission time.
        at: DateTime<Utc>,
        /// Free-form metadata.
        #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
        metadata: serde_json::Map<String, Value>,
    },
}

impl ExecutionEvent {
    /// The execution this event belongs to.
    #[must_use]
    pub fn execution_id(&self) -> Uuid {
        match self {
            Self::WorkflowStart { execution_id, .. }
            | Self::WorkflowEnd { execution_id, .. }
            | Self::NodeStart { execution_id, .. }
            | Self::NodeSuccess { execution_id, .. }
            | Self::NodeFailure { execution_id, .. } => *execution_id,
        }
    }

    /// The node this event belongs to, for node-scoped variants.
    #[must_use]
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::NodeStart { node_id, .. }
            | Self::NodeSuccess { node_id, .. }
            | Self::NodeFailure { node_id, .. } => Some(node_id),
            Self::WorkflowStart { .. } | Self::WorkflowEnd { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        let id = Uuid::new_v4();
        let event = ExecutionEvent::NodeFailure {
            execution_id: id,
            node_id: "c".into(),
            kind: "arithmetic".into(),
            duration: Duration::from_millis(3),
            error: "division by zero".into(),
            at: Utc::now(),
            metadata: serde_json::Map::new(),
        };
        assert_eq!(event.execution_id(), id);
        assert_eq!(event.node_id(), Some("c"));

        let event = ExecutionEvent::WorkflowStart {
            execution_id: id,
            workflow_id: None,
            at: Utc::now(),
            metadata: serde_json::Map::new(),
        };
        assert_eq!(event.node_id(), None);
    }

    #[test]
    fn serde_tagged_roundtrip() {
        let event = ExecutionEvent::NodeSuccess {
            execution_id: Uuid::new_v4(),
            node_id: "a".into(),
            kind: "value".into(),
            duration: Duration::from_millis(1),
            result: serde_json::json!(15),
            at: Utc::now(),
            metadata: serde_json::Map::new(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "node_success");
        let back: ExecutionEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
