//! Lifecycle events and their fan-out.
//!
//! Events are projections, not the source of truth: delivery is
//! fire-and-forget, observers get their own task per event, and a
//! panicking observer can never affect the workflow that produced the
//! event.

pub mod event;
pub mod observer;

pub use event::ExecutionEvent;
pub use observer::{Observer, ObserverBus};
