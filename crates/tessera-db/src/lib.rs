//! Tessera Data Layer
//!
//! All reads and writes of tenant-owned data go through the [`gate::Gate`],
//! which injects the tenant filter from the task-local context. Repositories
//! add typed APIs on top; the [`store`] backends do the actual persistence.

pub mod entity;
pub mod gate;
pub mod predicate;
pub mod record;
pub mod repos;
pub mod sequence;
pub mod store;

pub use entity::{EntityDef, Partitioning};
pub use gate::{BypassGate, Gate};
pub use predicate::Predicate;
pub use record::Record;
pub use sequence::CodeAllocator;
pub use store::{MemoryBackend, Scope, StoreBackend};
