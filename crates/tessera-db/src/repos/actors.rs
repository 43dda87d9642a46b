use std::sync::Arc;

use chrono::Utc;
use tessera_core::models::{PlatformAdmin, TenantUser};
use tessera_core::AppError;
use uuid::Uuid;

use crate::entity::{PLATFORM_ADMINS, TENANT_USERS};
use crate::predicate::Predicate;
use crate::record::Record;
use crate::store::{Scope, StoreBackend};

/// Accounts for both actor kinds. Lookups here feed login and token
/// verification, which run before a context exists, so the tenant scope is
/// always explicit.
#[derive(Clone)]
pub struct ActorRepository {
    store: Arc<dyn StoreBackend>,
}

impl ActorRepository {
    pub fn new(store: Arc<dyn StoreBackend>) -> Self {
        Self { store }
    }

    pub async fn create_tenant_user(
        &self,
        tenant_id: Uuid,
        username: &str,
        password_digest: &str,
        is_tenant_admin: bool,
    ) -> Result<TenantUser, AppError> {
        let username = username.trim().to_lowercase();
        if username.is_empty() {
            return Err(AppError::Validation("username must not be empty".into()));
        }
        if self
            .find_tenant_user(tenant_id, &username)
            .await?
            .is_some()
        {
            return Err(AppError::UniqueConflict(format!(
                "username '{}' already exists in tenant",
                username
            )));
        }

        let now = Utc::now();
        let user = TenantUser {
            id: Uuid::new_v4(),
            tenant_id,
            username,
            password_digest: password_digest.to_string(),
            is_tenant_admin,
            is_active: true,
            role_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let record = Record::from_model(user.id, Some(tenant_id), &user)?;
        self.store.insert(&TENANT_USERS, record).await?;
        Ok(user)
    }

    pub async fn create_platform_admin(
        &self,
        username: &str,
        password_digest: &str,
    ) -> Result<PlatformAdmin, AppError> {
        let username = username.trim().to_lowercase();
        if self.find_platform_admin(&username).await?.is_some() {
            return Err(AppError::UniqueConflict(format!(
                "platform admin '{}' already exists",
                username
            )));
        }
        let now = Utc::now();
        let admin = PlatformAdmin {
            id: Uuid::new_v4(),
            username,
            password_digest: password_digest.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let record = Record::from_model(admin.id, None, &admin)?;
        self.store.insert(&PLATFORM_ADMINS, record).await?;
        Ok(admin)
    }

    pub async fn find_tenant_user(
        &self,
        tenant_id: Uuid,
        username: &str,
    ) -> Result<Option<TenantUser>, AppError> {
        let records = self
            .store
            .find(
                &TENANT_USERS,
                Scope::tenant(tenant_id),
                &Predicate::eq("username", username),
            )
            .await?;
        records.first().map(Record::to_model).transpose()
    }

    pub async fn get_tenant_user(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<TenantUser>, AppError> {
        self.store
            .get(&TENANT_USERS, Scope::tenant(tenant_id), id)
            .await?
            .as_ref()
            .map(Record::to_model)
            .transpose()
    }

    pub async fn find_platform_admin(
        &self,
        username: &str,
    ) -> Result<Option<PlatformAdmin>, AppError> {
        let records = self
            .store
            .find(
                &PLATFORM_ADMINS,
                Scope::global(),
                &Predicate::eq("username", username),
            )
            .await?;
        records.first().map(Record::to_model).transpose()
    }

    pub async fn get_platform_admin(&self, id: Uuid) -> Result<Option<PlatformAdmin>, AppError> {
        self.store
            .get(&PLATFORM_ADMINS, Scope::global(), id)
            .await?
            .as_ref()
            .map(Record::to_model)
            .transpose()
    }

    /// Rewrite a tenant user's stored digest, used for rehash-on-login.
    pub async fn update_tenant_user_digest(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        password_digest: &str,
    ) -> Result<(), AppError> {
        let mut user = self
            .get_tenant_user(tenant_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("tenant_users {}", id)))?;
        user.password_digest = password_digest.to_string();
        user.updated_at = Utc::now();
        self.store
            .update(
                &TENANT_USERS,
                Scope::tenant(tenant_id),
                id,
                serde_json::to_value(&user)?,
            )
            .await?;
        Ok(())
    }

    pub async fn set_tenant_user_roles(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        role_ids: Vec<Uuid>,
    ) -> Result<TenantUser, AppError> {
        let mut user = self
            .get_tenant_user(tenant_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("tenant_users {}", id)))?;
        user.role_ids = role_ids;
        user.updated_at = Utc::now();
        self.store
            .update(
                &TENANT_USERS,
                Scope::tenant(tenant_id),
                id,
                serde_json::to_value(&user)?,
            )
            .await?;
        Ok(user)
    }

    pub async fn set_tenant_user_active(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        is_active: bool,
    ) -> Result<TenantUser, AppError> {
        let mut user = self
            .get_tenant_user(tenant_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("tenant_users {}", id)))?;
        user.is_active = is_active;
        user.updated_at = Utc::now();
        self.store
            .update(
                &TENANT_USERS,
                Scope::tenant(tenant_id),
                id,
                serde_json::to_value(&user)?,
            )
            .await?;
        Ok(user)
    }

    pub async fn list_tenant_users(&self, tenant_id: Uuid) -> Result<Vec<TenantUser>, AppError> {
        self.store
            .find(&TENANT_USERS, Scope::tenant(tenant_id), &Predicate::All)
            .await?
            .iter()
            .map(Record::to_model)
            .collect()
    }
}
