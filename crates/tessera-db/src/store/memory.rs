//! In-process store backend.
//!
//! Tables are per-entity maps behind a single RwLock; sequences and job
//! claims go through a Mutex so allocation and claiming stay atomic under
//! concurrency. Used by the test suites and by `STORE_BACKEND=memory`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tessera_core::AppError;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::entity::EntityDef;
use crate::predicate::Predicate;
use crate::record::Record;

use super::{Scope, StoreBackend};

#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<&'static str, HashMap<Uuid, Record>>>,
    sequences: Mutex<HashMap<(Uuid, String, String), u64>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn insert(
        &self,
        entity: &'static EntityDef,
        record: Record,
    ) -> Result<Record, AppError> {
        let mut tables = self.tables.write().await;
        let table = tables.entry(entity.name).or_default();
        if table.contains_key(&record.id) {
            return Err(AppError::UniqueConflict(format!(
                "{} id already exists",
                entity.name
            )));
        }
        table.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(
        &self,
        entity: &'static EntityDef,
        scope: Scope,
        id: Uuid,
    ) -> Result<Option<Record>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(entity.name)
            .and_then(|table| table.get(&id))
            .filter(|record| scope.admits(entity, record))
            .cloned())
    }

    async fn find(
        &self,
        entity: &'static EntityDef,
        scope: Scope,
        predicate: &Predicate,
    ) -> Result<Vec<Record>, AppError> {
        let tables = self.tables.read().await;
        let mut records: Vec<Record> = tables
            .get(entity.name)
            .map(|table| {
                table
                    .values()
                    .filter(|record| scope.admits(entity, record))
                    .filter(|record| predicate.matches(&record.data))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    async fn update(
        &self,
        entity: &'static EntityDef,
        scope: Scope,
        id: Uuid,
        data: Value,
    ) -> Result<Option<Record>, AppError> {
        let mut tables = self.tables.write().await;
        let Some(record) = tables.get_mut(entity.name).and_then(|t| t.get_mut(&id)) else {
            return Ok(None);
        };
        if !scope.admits(entity, record) {
            return Ok(None);
        }
        record.data = data;
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }

    async fn soft_remove(
        &self,
        entity: &'static EntityDef,
        scope: Scope,
        id: Uuid,
    ) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        let Some(record) = tables.get_mut(entity.name).and_then(|t| t.get_mut(&id)) else {
            return Ok(false);
        };
        if !scope.admits(entity, record) {
            return Ok(false);
        }
        record.removed_at = Some(Utc::now());
        record.updated_at = Utc::now();
        Ok(true)
    }

    async fn hard_remove(
        &self,
        entity: &'static EntityDef,
        scope: Scope,
        id: Uuid,
    ) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(entity.name) else {
            return Ok(false);
        };
        let admitted = table
            .get(&id)
            .map(|record| scope.admits(entity, record))
            .unwrap_or(false);
        if !admitted {
            return Ok(false);
        }
        table.remove(&id);
        Ok(true)
    }

    async fn next_sequence(
        &self,
        tenant: Uuid,
        entity: &str,
        scope_key: &str,
        start: u64,
        step: u64,
    ) -> Result<u64, AppError> {
        let mut sequences = self
            .sequences
            .lock()
            .map_err(|_| AppError::Internal("sequence lock poisoned".to_string()))?;
        let key = (tenant, entity.to_string(), scope_key.to_string());
        let value = match sequences.get(&key) {
            Some(last) => last + step,
            None => start,
        };
        sequences.insert(key, value);
        Ok(value)
    }

    async fn claim_due_job(&self, now: DateTime<Utc>) -> Result<Option<Record>, AppError> {
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(crate::entity::JOBS.name) else {
            return Ok(None);
        };

        // Oldest due pending job first.
        let mut due: Vec<(&Uuid, DateTime<Utc>)> = table
            .iter()
            .filter_map(|(id, record)| {
                let status = record.str_field("status")?;
                if status != "pending" {
                    return None;
                }
                let scheduled_at = record
                    .str_field("scheduled_at")
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc))?;
                (scheduled_at <= now).then_some((id, scheduled_at))
            })
            .collect();
        due.sort_by_key(|(_, scheduled_at)| *scheduled_at);

        let Some((&id, _)) = due.first() else {
            return Ok(None);
        };
        let record = table.get_mut(&id).ok_or_else(|| {
            AppError::Internal("claimed job vanished under write lock".to_string())
        })?;
        record.data["status"] = Value::String("running".to_string());
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{CUSTOMERS, JOBS};
    use serde_json::json;

    fn customer(tenant: Uuid, name: &str) -> Record {
        Record::new(Uuid::new_v4(), Some(tenant), json!({"name": name}))
    }

    #[tokio::test]
    async fn scoped_get_hides_other_tenants() {
        let store = MemoryBackend::new();
        let (tenant_a, tenant_b) = (Uuid::new_v4(), Uuid::new_v4());
        let record = store
            .insert(&CUSTOMERS, customer(tenant_a, "Acme"))
            .await
            .unwrap();

        let visible = store
            .get(&CUSTOMERS, Scope::tenant(tenant_a), record.id)
            .await
            .unwrap();
        assert!(visible.is_some());

        let hidden = store
            .get(&CUSTOMERS, Scope::tenant(tenant_b), record.id)
            .await
            .unwrap();
        assert!(hidden.is_none());
    }

    #[tokio::test]
    async fn soft_removed_records_are_filtered() {
        let store = MemoryBackend::new();
        let tenant = Uuid::new_v4();
        let record = store
            .insert(&CUSTOMERS, customer(tenant, "Acme"))
            .await
            .unwrap();

        assert!(store
            .soft_remove(&CUSTOMERS, Scope::tenant(tenant), record.id)
            .await
            .unwrap());

        let scope = Scope::tenant(tenant);
        assert!(store.get(&CUSTOMERS, scope, record.id).await.unwrap().is_none());
        assert!(store
            .get(&CUSTOMERS, scope.with_removed(), record.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn sequences_are_independent_per_scope_key() {
        let store = MemoryBackend::new();
        let tenant = Uuid::new_v4();

        assert_eq!(
            store
                .next_sequence(tenant, "invoice", "INV-2026-", 1, 1)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .next_sequence(tenant, "invoice", "INV-2026-", 1, 1)
                .await
                .unwrap(),
            2
        );
        // A different scope key restarts from start.
        assert_eq!(
            store
                .next_sequence(tenant, "invoice", "INV-2027-", 1, 1)
                .await
                .unwrap(),
            1
        );
        // A different tenant is fully independent.
        assert_eq!(
            store
                .next_sequence(Uuid::new_v4(), "invoice", "INV-2026-", 1, 1)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn claim_flips_pending_to_running_once() {
        let store = MemoryBackend::new();
        let now = Utc::now();
        store
            .insert(
                &JOBS,
                Record::new(
                    Uuid::new_v4(),
                    None,
                    json!({
                        "status": "pending",
                        "scheduled_at": now.to_rfc3339(),
                        "kind": "export",
                    }),
                ),
            )
            .await
            .unwrap();

        let first = store.claim_due_job(now).await.unwrap();
        assert!(first.is_some());
        assert_eq!(first.unwrap().str_field("status"), Some("running"));

        let second = store.claim_due_job(now).await.unwrap();
        assert!(second.is_none());
    }
}
