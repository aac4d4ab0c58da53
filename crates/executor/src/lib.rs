//! The executor layer: the per-kind contract, the registry that
//! dispatches on node kind, the per-execution context with its protection
//! counters, and the built-in executor catalogue.
//!
//! Executors are pure, replaceable units behind one contract: `kind`
//! names the tag, `validate` statically checks a node's configuration,
//! and `execute` turns context plus node into a value. Every executor
//! counts itself against the execution budget before doing work.

pub mod builtins;
pub mod context;
pub mod error;
pub mod executor;
pub mod registry;
pub mod template;

pub use context::ExecutionContext;
pub use error::ExecutorError;
pub use executor::Executor;
pub use registry::ExecutorRegistry;
