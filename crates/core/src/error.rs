//! Resource-limit errors and the cross-crate error classification.

use serde::{Deserialize, Serialize};

/// Classification of a failure, stable across the whole taxonomy.
///
/// Every error the engine can surface maps onto exactly one class; the
/// class is carried into the execution result so embedders can react
/// without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Malformed payload, duplicate ids, unknown kinds, bad configuration.
    Validation,
    /// Cycle or missing edge endpoint.
    Graph,
    /// Failure inside an executor (divide by zero, type mismatch, ...).
    Execution,
    /// A quantitative limit was breached.
    Limit,
    /// The egress guard rejected a destination.
    Security,
    /// The execution deadline elapsed.
    Timeout,
    /// The execution was cancelled.
    Cancelled,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::Graph => "graph",
            Self::Execution => "execution",
            Self::Limit => "limit",
            Self::Security => "security",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// A breached quantitative limit, with the configured bound and the value
/// observed at the moment of the breach.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum LimitError {
    /// A string exceeded `max_string_length`.
    #[error("string of {length} bytes exceeds max_string_length {limit}")]
    StringTooLong {
        /// Observed byte length.
        length: usize,
        /// Configured bound.
        limit: usize,
    },

    /// A sequence exceeded `max_array_length`.
    #[error("array of {length} elements exceeds max_array_length {limit}")]
    ArrayTooLong {
        /// Observed element count.
        length: usize,
        /// Configured bound.
        limit: usize,
    },

    /// Nesting exceeded `max_context_depth`.
    #[error("value nesting of depth {depth} exceeds max_context_depth {limit}")]
    DepthExceeded {
        /// Observed depth.
        depth: usize,
        /// Configured bound.
        limit: usize,
    },

    /// `count_node_execution` went past `max_node_executions`.
    #[error("node execution count {observed} exceeds max_node_executions {limit}")]
    NodeExecutions {
        /// Post-increment counter value.
        observed: u32,
        /// Configured bound.
        limit: u32,
    },

    /// `count_http_call` went past `max_http_calls_per_exec`.
    #[error("HTTP call count {observed} exceeds max_http_calls_per_exec {limit}")]
    HttpCalls {
        /// Post-increment counter value.
        observed: u32,
        /// Configured bound.
        limit: u32,
    },

    /// The variable map is at `max_variables`.
    #[error("variable count {observed} exceeds max_variables {limit}")]
    Variables {
        /// Observed variable count.
        observed: usize,
        /// Configured bound.
        limit: usize,
    },

    /// An iteration bound (`max_iterations`) was hit.
    #[error("iteration count {observed} exceeds max_iterations {limit}")]
    Iterations {
        /// Observed iteration count.
        observed: u32,
        /// Configured bound.
        limit: u32,
    },

    /// A node's serialized configuration exceeded `max_input_size`.
    #[error("node input of {size} bytes exceeds max_input_size {limit}")]
    InputTooLarge {
        /// Observed byte size.
        size: usize,
        /// Configured bound.
        limit: usize,
    },

    /// The serialized payload exceeded `max_payload_size`.
    #[error("payload of {size} bytes exceeds max_payload_size {limit}")]
    PayloadTooLarge {
        /// Observed byte size.
        size: usize,
        /// Configured bound.
        limit: usize,
    },

    /// An HTTP response body exceeded `max_response_size`.
    #[error("response too large: body exceeds max_response_size {limit} bytes")]
    ResponseTooLarge {
        /// Configured bound.
        limit: usize,
    },
}

impl LimitError {
    /// All limit errors classify as [`ErrorClass::Limit`].
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Limit
    }
}
