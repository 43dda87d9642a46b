//! Tessera Core Library
//!
//! This crate provides the domain models, error taxonomy, configuration, and
//! the task-local tenant context carrier shared across all Tessera components.

pub mod config;
pub mod context;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{Config, StoreKind};
pub use context::TenantContext;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{ActorKind, Principal};
