//! Storage backends.
//!
//! A backend persists gate-neutral [`Record`]s and knows nothing about the
//! tenant context: the [`Scope`] it receives is already resolved by the
//! gate. Two implementations exist, an in-process store used by tests and
//! local development, and PostgreSQL.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tessera_core::AppError;
use uuid::Uuid;

use crate::entity::EntityDef;
use crate::predicate::Predicate;
use crate::record::Record;

pub use memory::MemoryBackend;
pub use postgres::PgBackend;

/// The visibility window a backend operation runs under. Computed by the
/// gate; `tenant: Some(..)` restricts every row touched to that tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    pub tenant: Option<Uuid>,
    pub include_removed: bool,
}

impl Scope {
    pub fn tenant(tenant: Uuid) -> Self {
        Self {
            tenant: Some(tenant),
            include_removed: false,
        }
    }

    pub fn global() -> Self {
        Self {
            tenant: None,
            include_removed: false,
        }
    }

    pub fn with_removed(mut self) -> Self {
        self.include_removed = true;
        self
    }

    fn admits(&self, entity: &EntityDef, record: &Record) -> bool {
        if let Some(tenant) = self.tenant {
            if record.tenant_id != Some(tenant) {
                return false;
            }
        }
        if !self.include_removed && entity.soft_delete && record.is_removed() {
            return false;
        }
        true
    }
}

#[async_trait]
pub trait StoreBackend: Send + Sync {
    async fn insert(&self, entity: &'static EntityDef, record: Record)
        -> Result<Record, AppError>;

    async fn get(
        &self,
        entity: &'static EntityDef,
        scope: Scope,
        id: Uuid,
    ) -> Result<Option<Record>, AppError>;

    async fn find(
        &self,
        entity: &'static EntityDef,
        scope: Scope,
        predicate: &Predicate,
    ) -> Result<Vec<Record>, AppError>;

    /// Replace the payload of an existing record. Returns the updated record,
    /// or `None` when the scope does not admit it.
    async fn update(
        &self,
        entity: &'static EntityDef,
        scope: Scope,
        id: Uuid,
        data: Value,
    ) -> Result<Option<Record>, AppError>;

    /// Mark a record removed. Returns false when the scope does not admit it.
    async fn soft_remove(
        &self,
        entity: &'static EntityDef,
        scope: Scope,
        id: Uuid,
    ) -> Result<bool, AppError>;

    /// Physically delete a record.
    async fn hard_remove(
        &self,
        entity: &'static EntityDef,
        scope: Scope,
        id: Uuid,
    ) -> Result<bool, AppError>;

    /// Atomically advance the counter for `(tenant, entity, scope_key)` and
    /// return the allocated value. The first call yields `start`.
    async fn next_sequence(
        &self,
        tenant: Uuid,
        entity: &str,
        scope_key: &str,
        start: u64,
        step: u64,
    ) -> Result<u64, AppError>;

    /// Atomically claim one due pending job, flipping it to running. At most
    /// one concurrent caller receives any given job.
    async fn claim_due_job(&self, now: DateTime<Utc>) -> Result<Option<Record>, AppError>;
}
