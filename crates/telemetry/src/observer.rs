//! Observer registration and asynchronous fan-out.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;

use crate::event::ExecutionEvent;

/// A sink for execution lifecycle events.
///
/// Implementations must not assume any ordering across executions and
/// must keep up on their own; the bus never applies backpressure.
pub trait Observer: Send + Sync {
    /// Handle one event. A panic here is absorbed by the delivery task.
    fn on_event(&self, event: &ExecutionEvent);
}

impl<F> Observer for F
where
    F: Fn(&ExecutionEvent) + Send + Sync,
{
    fn on_event(&self, event: &ExecutionEvent) {
        self(event);
    }
}

/// Fan-out of [`ExecutionEvent`]s to registered observers.
///
/// Registration is copy-on-write, so `emit` reads the observer list
/// without a lock. Each delivery runs on its own task: fire-and-forget,
/// panic-isolated, unordered across observers and executions.
#[derive(Default)]
pub struct ObserverBus {
    observers: ArcSwap<Vec<Arc<dyn Observer>>>,
    emitted: AtomicU64,
}

impl ObserverBus {
    /// Bus with no observers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer. Existing in-flight deliveries are unaffected.
    pub fn register(&self, observer: Arc<dyn Observer>) {
        let current = self.observers.load();
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(observer);
        self.observers.store(Arc::new(next));
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.load().len()
    }

    /// Total events emitted since creation.
    #[must_use]
    pub fn total_emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Deliver `event` to every observer, each on its own task.
    ///
    /// Must be called from within a tokio runtime. A panic in an
    /// observer unwinds its delivery task and nothing else.
    pub fn emit(&self, event: ExecutionEvent) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
        let observers = self.observers.load_full();
        if observers.is_empty() {
            return;
        }
        for observer in observers.iter() {
            let observer = Arc::clone(observer);
            let event = event.clone();
            // Fire-and-forget: the JoinHandle is dropped, and a panic in
            // `on_event` dies with the task instead of the workflow.
            let _ = tokio::spawn(async move {
                observer.on_event(&event);
            });
        }
    }
}

impl std::fmt::Debug for ObserverBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverBus")
            .field("observers", &self.observer_count())
            .field("emitted", &self.total_emitted())
            .finish()
    }
}
