//! Tessera API
//!
//! The HTTP surface: request admission (token verification, tenant status,
//! context establishment), authorization, and the control-plane and demo
//! endpoints. Everything below the admission middleware runs inside a
//! task-local tenant context.

pub mod auth;
pub mod authz;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod setup;
pub mod state;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
