//! Tessera Worker
//!
//! Background job processing. Jobs are enqueued with an identity envelope
//! captured from the caller's tenant context; the worker re-establishes that
//! context before dispatching, so job handlers run under the same isolation
//! guarantees as request handlers.

pub mod handler;
pub mod queue;

pub use handler::JobHandler;
pub use queue::{JobQueue, JobQueueConfig};
