//! In-process job registry.
//!
//! Long-running capability calls are wrapped in jobs: insert-on-submit,
//! update-on-transition, time-boxed eviction after reaching a terminal
//! state. Callers poll by id. Only the [`JobHandle`] returned at submit time
//! may transition its job.

pub mod error;
pub mod registry;

pub use error::{JobsError, JobsResult};
pub use registry::{JobHandle, JobRegistry, JobsConfig};
