//! Terminal status of an execution.

use serde::{Deserialize, Serialize};

/// How an execution ended.
///
/// `new -> running` transitions are internal; the result only ever
/// carries one of these terminal states, and they are sticky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Every node completed.
    Completed,
    /// An executor failed; later levels did not run.
    Failed,
    /// The `max_execution_time` deadline elapsed.
    TimedOut,
    /// The host cancelled the execution.
    Cancelled,
}

impl ExecutionStatus {
    /// True only for [`ExecutionStatus::Completed`].
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Completed)
    }

    /// True for failed and timed-out runs.
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::TimedOut)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_and_failure_predicates() {
        assert!(ExecutionStatus::Completed.is_success());
        assert!(!ExecutionStatus::Completed.is_failure());
        assert!(ExecutionStatus::Failed.is_failure());
        assert!(ExecutionStatus::TimedOut.is_failure());
        assert!(!ExecutionStatus::Cancelled.is_failure());
    }

    #[test]
    fn serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&ExecutionStatus::TimedOut).unwrap(),
            "\"timed_out\""
        );
    }

    #[test]
    fn display_matches_serde() {
        assert_eq!(ExecutionStatus::TimedOut.to_string(), "timed_out");
        assert_eq!(ExecutionStatus::Completed.to_string(), "completed");
    }
}
