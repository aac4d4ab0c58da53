//! The built-in executor catalogue.
//!
//! Each executor is a small, pure unit behind the [`Executor`] contract;
//! the engine ships them pre-registered and embedders add custom kinds
//! next to them.

use std::sync::Arc;

use crate::executor::Executor;

mod cache;
mod condition;
mod context;
mod flow;
mod http;
mod math;
mod state;
mod text;
mod value;
mod visual;

pub use cache::CacheExecutor;
pub use condition::ConditionExecutor;
pub use context::{ContextConstantExecutor, ContextVariableExecutor};
pub use flow::{DelayExecutor, RepeatExecutor, RetryExecutor};
pub use http::HttpExecutor;
pub use math::ArithmeticExecutor;
pub use state::{AccumulatorExecutor, CounterExecutor, VariableExecutor};
pub use text::{TextExecutor, TextOpExecutor};
pub use value::ValueExecutor;
pub use visual::VisualizationExecutor;

/// One instance of every built-in executor.
#[must_use]
pub fn all() -> Vec<Arc<dyn Executor>> {
    vec![
        Arc::new(ValueExecutor),
        Arc::new(ArithmeticExecutor),
        Arc::new(TextExecutor),
        Arc::new(TextOpExecutor),
        Arc::new(HttpExecutor),
        Arc::new(ConditionExecutor),
        Arc::new(VariableExecutor),
        Arc::new(AccumulatorExecutor),
        Arc::new(CounterExecutor),
        Arc::new(CacheExecutor),
        Arc::new(DelayExecutor),
        Arc::new(RetryExecutor),
        Arc::new(RepeatExecutor),
        Arc::new(ContextVariableExecutor),
        Arc::new(ContextConstantExecutor),
        Arc::new(VisualizationExecutor),
    ]
}
