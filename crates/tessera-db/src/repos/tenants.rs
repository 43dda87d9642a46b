use std::sync::Arc;

use tessera_core::models::{Tenant, TenantStatus};
use tessera_core::AppError;
use uuid::Uuid;

use crate::entity::TENANTS;
use crate::predicate::Predicate;
use crate::record::Record;
use crate::store::{Scope, StoreBackend};

/// Tenant records are platform-global and are read during admission,
/// before any context exists, so this repository scopes explicitly.
#[derive(Clone)]
pub struct TenantRepository {
    store: Arc<dyn StoreBackend>,
}

impl TenantRepository {
    pub fn new(store: Arc<dyn StoreBackend>) -> Self {
        Self { store }
    }

    fn to_tenant(record: &Record) -> Result<Tenant, AppError> {
        record.to_model()
    }

    pub async fn create(
        &self,
        slug: &str,
        display_name: &str,
        timezone: &str,
    ) -> Result<Tenant, AppError> {
        let slug = slug.trim().to_lowercase();
        if slug.is_empty() || !slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(AppError::Validation(
                "slug must be non-empty lowercase alphanumeric with dashes".to_string(),
            ));
        }
        if self.by_slug(&slug).await?.is_some() {
            return Err(AppError::UniqueConflict(format!(
                "tenant slug '{}' already exists",
                slug
            )));
        }
        // Reject bad timezones at the door instead of at first allocation.
        timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| AppError::Validation(format!("unknown timezone '{}'", timezone)))?;

        let now = chrono::Utc::now();
        let tenant = Tenant {
            id: Uuid::new_v4(),
            slug,
            display_name: display_name.to_string(),
            status: TenantStatus::Active,
            timezone: timezone.to_string(),
            created_at: now,
            updated_at: now,
        };
        let record = Record::from_model(tenant.id, None, &tenant)?;
        self.store.insert(&TENANTS, record).await?;
        Ok(tenant)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Tenant>, AppError> {
        self.store
            .get(&TENANTS, Scope::global(), id)
            .await?
            .as_ref()
            .map(Self::to_tenant)
            .transpose()
    }

    pub async fn by_slug(&self, slug: &str) -> Result<Option<Tenant>, AppError> {
        let records = self
            .store
            .find(&TENANTS, Scope::global(), &Predicate::eq("slug", slug))
            .await?;
        records.first().map(Self::to_tenant).transpose()
    }

    pub async fn list(&self) -> Result<Vec<Tenant>, AppError> {
        self.store
            .find(&TENANTS, Scope::global(), &Predicate::All)
            .await?
            .iter()
            .map(Self::to_tenant)
            .collect()
    }

    pub async fn set_status(&self, id: Uuid, status: TenantStatus) -> Result<Tenant, AppError> {
        let record = self
            .store
            .get(&TENANTS, Scope::global(), id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("tenants {}", id)))?;
        let mut tenant = Self::to_tenant(&record)?;
        tenant.status = status;
        tenant.updated_at = chrono::Utc::now();
        let data = serde_json::to_value(&tenant)?;
        self.store
            .update(&TENANTS, Scope::global(), id, data)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("tenants {}", id)))?;
        Ok(tenant)
    }

    pub async fn set_timezone(&self, id: Uuid, timezone: &str) -> Result<Tenant, AppError> {
        timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| AppError::Validation(format!("unknown timezone '{}'", timezone)))?;
        let record = self
            .store
            .get(&TENANTS, Scope::global(), id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("tenants {}", id)))?;
        let mut tenant = Self::to_tenant(&record)?;
        tenant.timezone = timezone.to_string();
        tenant.updated_at = chrono::Utc::now();
        self.store
            .update(&TENANTS, Scope::global(), id, serde_json::to_value(&tenant)?)
            .await?;
        Ok(tenant)
    }

    pub async fn soft_remove(&self, id: Uuid) -> Result<(), AppError> {
        let removed = self.store.soft_remove(&TENANTS, Scope::global(), id).await?;
        if !removed {
            return Err(AppError::NotFound(format!("tenants {}", id)));
        }
        Ok(())
    }

    /// The admission check: the tenant must exist and be active.
    pub async fn require_active(&self, id: Uuid) -> Result<Tenant, AppError> {
        let tenant = self
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("tenants {}", id)))?;
        if !tenant.is_active() {
            return Err(AppError::TenantSuspended);
        }
        Ok(tenant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;

    fn repo() -> TenantRepository {
        TenantRepository::new(Arc::new(MemoryBackend::new()))
    }

    #[tokio::test]
    async fn create_and_resolve_by_slug() {
        let repo = repo();
        let tenant = repo.create("acme", "Acme Corp", "UTC").await.unwrap();
        let found = repo.by_slug("acme").await.unwrap().unwrap();
        assert_eq!(found.id, tenant.id);
        assert!(found.is_active());
    }

    #[tokio::test]
    async fn duplicate_slug_conflicts() {
        let repo = repo();
        repo.create("acme", "Acme Corp", "UTC").await.unwrap();
        let err = repo.create("acme", "Other", "UTC").await.unwrap_err();
        assert!(matches!(err, AppError::UniqueConflict(_)));
    }

    #[tokio::test]
    async fn invalid_slug_and_timezone_are_rejected() {
        let repo = repo();
        assert!(repo.create("Acme Inc", "x", "UTC").await.is_err());
        assert!(repo.create("acme", "x", "Mars/Olympus").await.is_err());
    }

    #[tokio::test]
    async fn suspended_tenant_fails_admission() {
        let repo = repo();
        let tenant = repo.create("acme", "Acme Corp", "UTC").await.unwrap();
        assert!(repo.require_active(tenant.id).await.is_ok());

        repo.set_status(tenant.id, TenantStatus::Suspended)
            .await
            .unwrap();
        let err = repo.require_active(tenant.id).await.unwrap_err();
        assert!(matches!(err, AppError::TenantSuspended));
    }
}
