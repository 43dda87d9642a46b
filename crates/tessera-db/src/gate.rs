//! Data access gate.
//!
//! The gate is the only path to stored records. For tenant-partitioned
//! entities it reads the tenant from the task-local context and applies the
//! filter itself; callers cannot widen or drop it. Records that exist under
//! a different tenant are indistinguishable from records that do not exist.
//!
//! [`BypassGate`] is the audited escape hatch for platform administration:
//! it sees across tenants and through soft deletion, and every call leaves
//! an audit record.

use std::sync::Arc;

use serde_json::Value;
use tessera_core::models::ActorKind;
use tessera_core::{context, AppError};
use uuid::Uuid;

use crate::entity::EntityDef;
use crate::predicate::Predicate;
use crate::record::Record;
use crate::store::{Scope, StoreBackend};

#[derive(Clone)]
pub struct Gate {
    store: Arc<dyn StoreBackend>,
}

impl Gate {
    pub fn new(store: Arc<dyn StoreBackend>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn StoreBackend> {
        self.store.clone()
    }

    /// Resolve the scope for an entity from the current context.
    fn scope_for(&self, entity: &EntityDef) -> Result<Scope, AppError> {
        // A context must exist even for global entities: no admitted task,
        // no data access.
        let ctx = context::require()?;
        if entity.is_tenant_partitioned() {
            let tenant = ctx.tenant_id.ok_or(AppError::ContextMissing)?;
            Ok(Scope::tenant(tenant))
        } else {
            Ok(Scope::global())
        }
    }

    /// Reject payloads that carry a tenant id other than the context's.
    fn check_payload_tenant(&self, entity: &EntityDef, data: &Value) -> Result<(), AppError> {
        if !entity.is_tenant_partitioned() {
            return Ok(());
        }
        if let Some(claimed) = data.get("tenant_id").and_then(Value::as_str) {
            let ctx = context::require()?;
            let claimed: Uuid = claimed
                .parse()
                .map_err(|_| AppError::Validation("tenant_id must be a UUID".to_string()))?;
            if ctx.tenant_id != Some(claimed) {
                return Err(AppError::TenantMismatch);
            }
        }
        Ok(())
    }

    pub async fn create(&self, entity: &'static EntityDef, data: Value) -> Result<Record, AppError> {
        let scope = self.scope_for(entity)?;
        self.check_payload_tenant(entity, &data)?;
        let tenant_id = match scope.tenant {
            Some(tenant) => Some(tenant),
            // Global entities may still remember an owning tenant (jobs do).
            None => context::require()?.tenant_id,
        };
        // Honor an id already present in the payload so typed models and
        // their stored records agree.
        let id = data
            .get("id")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(Uuid::new_v4);
        let record = Record::new(id, tenant_id, data);
        self.store.insert(entity, record).await
    }

    pub async fn get(
        &self,
        entity: &'static EntityDef,
        id: Uuid,
    ) -> Result<Option<Record>, AppError> {
        let scope = self.scope_for(entity)?;
        self.store.get(entity, scope, id).await
    }

    /// Like `get`, with absence folded into `NotFound`.
    pub async fn get_required(
        &self,
        entity: &'static EntityDef,
        id: Uuid,
    ) -> Result<Record, AppError> {
        self.get(entity, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", entity.name, id)))
    }

    pub async fn find(
        &self,
        entity: &'static EntityDef,
        predicate: &Predicate,
    ) -> Result<Vec<Record>, AppError> {
        let scope = self.scope_for(entity)?;
        self.store.find(entity, scope, predicate).await
    }

    /// Like `get`, with soft-deleted records included. Still tenant-scoped:
    /// a tenant inspecting its own removed records does not need the bypass.
    pub async fn get_including_removed(
        &self,
        entity: &'static EntityDef,
        id: Uuid,
    ) -> Result<Option<Record>, AppError> {
        let scope = self.scope_for(entity)?.with_removed();
        self.store.get(entity, scope, id).await
    }

    /// Like `find`, with soft-deleted records included. Still tenant-scoped.
    pub async fn find_including_removed(
        &self,
        entity: &'static EntityDef,
        predicate: &Predicate,
    ) -> Result<Vec<Record>, AppError> {
        let scope = self.scope_for(entity)?.with_removed();
        self.store.find(entity, scope, predicate).await
    }

    pub async fn find_one(
        &self,
        entity: &'static EntityDef,
        predicate: &Predicate,
    ) -> Result<Option<Record>, AppError> {
        Ok(self.find(entity, predicate).await?.into_iter().next())
    }

    pub async fn update(
        &self,
        entity: &'static EntityDef,
        id: Uuid,
        data: Value,
    ) -> Result<Record, AppError> {
        let scope = self.scope_for(entity)?;
        self.check_payload_tenant(entity, &data)?;
        self.store
            .update(entity, scope, id, data)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", entity.name, id)))
    }

    /// Remove a record: soft when the entity retains removals, hard
    /// otherwise. Hard removal of soft-delete entities is bypass-only.
    pub async fn remove(&self, entity: &'static EntityDef, id: Uuid) -> Result<(), AppError> {
        let scope = self.scope_for(entity)?;
        let removed = if entity.soft_delete {
            self.store.soft_remove(entity, scope, id).await?
        } else {
            self.store.hard_remove(entity, scope, id).await?
        };
        if !removed {
            return Err(AppError::NotFound(format!("{} {}", entity.name, id)));
        }
        Ok(())
    }

    /// Open the audited cross-tenant view. Platform admins only.
    pub fn bypass(&self, reason: &str) -> Result<BypassGate, AppError> {
        let ctx = context::require()?;
        if ctx.actor_kind != ActorKind::PlatformAdmin {
            return Err(AppError::NotAuthorized(
                "cross-tenant access requires a platform administrator".to_string(),
            ));
        }
        tracing::info!(
            target: "audit",
            actor_id = %ctx.actor_id,
            request_id = %ctx.request_id,
            reason = %reason,
            "bypass gate opened"
        );
        Ok(BypassGate {
            store: self.store.clone(),
            actor_id: ctx.actor_id,
            request_id: ctx.request_id,
        })
    }
}

/// Cross-tenant, removal-inclusive access for platform administration.
/// Every operation is audited with the opening actor and request.
pub struct BypassGate {
    store: Arc<dyn StoreBackend>,
    actor_id: Uuid,
    request_id: String,
}

impl BypassGate {
    fn audit(&self, entity: &EntityDef, op: &str, id: Option<Uuid>) {
        tracing::info!(
            target: "audit",
            actor_id = %self.actor_id,
            request_id = %self.request_id,
            entity = entity.name,
            op = op,
            id = ?id,
            "bypass access"
        );
    }

    fn scope(tenant: Option<Uuid>) -> Scope {
        Scope {
            tenant,
            include_removed: true,
        }
    }

    pub async fn get(
        &self,
        entity: &'static EntityDef,
        id: Uuid,
    ) -> Result<Option<Record>, AppError> {
        self.audit(entity, "get", Some(id));
        self.store.get(entity, Self::scope(None), id).await
    }

    /// Find across all tenants, or within one when `tenant` is given.
    pub async fn find(
        &self,
        entity: &'static EntityDef,
        tenant: Option<Uuid>,
        predicate: &Predicate,
    ) -> Result<Vec<Record>, AppError> {
        self.audit(entity, "find", None);
        self.store.find(entity, Self::scope(tenant), predicate).await
    }

    pub async fn update(
        &self,
        entity: &'static EntityDef,
        id: Uuid,
        data: Value,
    ) -> Result<Record, AppError> {
        self.audit(entity, "update", Some(id));
        self.store
            .update(entity, Self::scope(None), id, data)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", entity.name, id)))
    }

    /// Physical deletion, the only path that erases soft-deleted records.
    pub async fn hard_remove(
        &self,
        entity: &'static EntityDef,
        id: Uuid,
    ) -> Result<(), AppError> {
        self.audit(entity, "hard_remove", Some(id));
        let removed = self.store.hard_remove(entity, Self::scope(None), id).await?;
        if !removed {
            return Err(AppError::NotFound(format!("{} {}", entity.name, id)));
        }
        Ok(())
    }
}
