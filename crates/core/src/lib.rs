//! Shared foundations for the Lattice workflow engine.
//!
//! Holds the pieces every other crate needs: the [`Limits`] configuration
//! with its three presets, the [`ValueGuard`] that bounds any value before
//! it enters engine-visible state, and the error classification shared by
//! the whole error taxonomy.

pub mod error;
pub mod guard;
pub mod limits;

pub use error::{ErrorClass, LimitError};
pub use guard::ValueGuard;
pub use limits::{BackoffStrategy, HttpAuth, HttpClientConfig, Limits};
