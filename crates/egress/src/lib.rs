//! Zero-trust egress layer for HTTP-capable executors.
//!
//! Every outgoing URL -- including every redirect target -- passes through
//! the [`EgressPolicy`] before any network activity: scheme allow-list,
//! loopback / private / link-local / cloud-metadata blocks, and the
//! domain allow-list. The [`ClientPool`] owns the engine-lifetime
//! keep-alive clients and reads response bodies through a size-bounded
//! reader.

pub mod client;
pub mod error;
pub mod policy;

pub use client::{ClientPool, HttpResponse};
pub use error::{BlockedCategory, EgressError};
pub use policy::EgressPolicy;
