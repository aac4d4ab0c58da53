//! The Lattice workflow engine.
//!
//! Assembles the graph builder, level partitioner, executor registry,
//! egress layer, and observer bus behind one facade:
//!
//! ```ignore
//! let engine = Engine::new(Limits::development())?;
//! let payload: WorkflowPayload = serde_json::from_str(json)?;
//! let result = engine.execute(&payload).await?;
//! ```
//!
//! `execute` runs each level's nodes in parallel under the concurrency
//! bound; `execute_sequential` keeps the same topological order with no
//! intra-level parallelism.

pub mod engine;
pub mod error;
pub mod result;
pub mod status;

pub use engine::Engine;
pub use error::EngineError;
pub use result::{ExecutionFailure, ExecutionResult, NodeResult};
pub use status::ExecutionStatus;
