//! Executor failures and their taxonomy classes.

use lattice_core::{ErrorClass, LimitError};
use lattice_egress::EgressError;

/// Failure raised by an executor or the context it works against.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ExecutorError {
    /// The node's configuration is unusable for this kind.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The node ran and failed.
    #[error("{0}")]
    Execution(String),

    /// A predecessor produced no output to consume.
    #[error("missing input from node `{0}`")]
    MissingInput(String),

    /// The input had the wrong shape for this kind.
    #[error("type mismatch: expected {expected}, got {found}")]
    TypeMismatch {
        /// What the executor needed.
        expected: String,
        /// What the predecessor delivered.
        found: String,
    },

    /// A kind was registered twice.
    #[error("executor kind `{0}` is already registered")]
    DuplicateKind(String),

    /// No executor is registered for the node's kind.
    #[error("unknown node kind `{0}`")]
    UnknownKind(String),

    /// A protection-layer bound was breached.
    #[error(transparent)]
    Limit(#[from] LimitError),

    /// The egress layer rejected or failed the request.
    #[error(transparent)]
    Egress(#[from] EgressError),

    /// The shared cancellation signal fired.
    #[error("execution cancelled")]
    Cancelled,

    /// The execution deadline elapsed.
    #[error("execution deadline elapsed")]
    DeadlineElapsed,
}

impl ExecutorError {
    /// Taxonomy class of this failure.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Config(_) | Self::DuplicateKind(_) | Self::UnknownKind(_) => {
                ErrorClass::Validation
            }
            Self::Execution(_) | Self::MissingInput(_) | Self::TypeMismatch { .. } => {
                ErrorClass::Execution
            }
            Self::Limit(_) => ErrorClass::Limit,
            Self::Egress(e) => e.class(),
            Self::Cancelled => ErrorClass::Cancelled,
            Self::DeadlineElapsed => ErrorClass::Timeout,
        }
    }
}
