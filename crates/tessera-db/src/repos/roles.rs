use chrono::Utc;
use tessera_core::models::{Permission, Role};
use tessera_core::{context, AppError};
use uuid::Uuid;

use crate::entity::{PERMISSIONS, ROLES};
use crate::gate::Gate;
use crate::predicate::Predicate;
use crate::record::Record;

/// Roles and permissions, fully gate-scoped: every operation runs under the
/// caller's tenant context. Role membership of permission codes is validated
/// against the same tenant's permission catalogue.
#[derive(Clone)]
pub struct RoleRepository {
    gate: Gate,
}

impl RoleRepository {
    pub fn new(gate: Gate) -> Self {
        Self { gate }
    }

    pub async fn create_permission(
        &self,
        code: &str,
        description: &str,
    ) -> Result<Permission, AppError> {
        let code = code.trim().to_lowercase();
        if code.is_empty() {
            return Err(AppError::Validation("permission code must not be empty".into()));
        }
        let existing = self
            .gate
            .find(&PERMISSIONS, &Predicate::eq("code", code.as_str()))
            .await?;
        if !existing.is_empty() {
            return Err(AppError::UniqueConflict(format!(
                "permission '{}' already exists",
                code
            )));
        }

        let now = Utc::now();
        let permission = Permission {
            id: Uuid::new_v4(),
            tenant_id: context::require_tenant_id()?,
            code,
            description: description.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.gate
            .create(&PERMISSIONS, serde_json::to_value(&permission)?)
            .await?;
        Ok(permission)
    }

    pub async fn list_permissions(&self) -> Result<Vec<Permission>, AppError> {
        self.gate
            .find(&PERMISSIONS, &Predicate::All)
            .await?
            .iter()
            .map(Record::to_model)
            .collect()
    }

    /// Every permission code on a role must exist in the tenant's catalogue.
    async fn check_codes(&self, codes: &[String]) -> Result<(), AppError> {
        for code in codes {
            let found = self
                .gate
                .find(&PERMISSIONS, &Predicate::eq("code", code.as_str()))
                .await?;
            if found.is_empty() {
                return Err(AppError::Validation(format!(
                    "unknown permission code '{}'",
                    code
                )));
            }
        }
        Ok(())
    }

    pub async fn create_role(
        &self,
        name: &str,
        permission_codes: Vec<String>,
    ) -> Result<Role, AppError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("role name must not be empty".into()));
        }
        let existing = self
            .gate
            .find(&ROLES, &Predicate::eq("name", name.as_str()))
            .await?;
        if !existing.is_empty() {
            return Err(AppError::UniqueConflict(format!(
                "role '{}' already exists",
                name
            )));
        }
        self.check_codes(&permission_codes).await?;

        let now = Utc::now();
        let role = Role {
            id: Uuid::new_v4(),
            tenant_id: context::require_tenant_id()?,
            name,
            permission_codes,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.gate.create(&ROLES, serde_json::to_value(&role)?).await?;
        Ok(role)
    }

    pub async fn get_role(&self, id: Uuid) -> Result<Option<Role>, AppError> {
        self.gate
            .get(&ROLES, id)
            .await?
            .as_ref()
            .map(Record::to_model)
            .transpose()
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>, AppError> {
        self.gate
            .find(&ROLES, &Predicate::All)
            .await?
            .iter()
            .map(Record::to_model)
            .collect()
    }

    pub async fn set_role_permissions(
        &self,
        id: Uuid,
        permission_codes: Vec<String>,
    ) -> Result<Role, AppError> {
        self.check_codes(&permission_codes).await?;
        let record = self.gate.get_required(&ROLES, id).await?;
        let mut role: Role = record.to_model()?;
        role.permission_codes = permission_codes;
        role.updated_at = Utc::now();
        self.gate
            .update(&ROLES, id, serde_json::to_value(&role)?)
            .await?;
        Ok(role)
    }

    pub async fn set_role_active(&self, id: Uuid, is_active: bool) -> Result<Role, AppError> {
        let record = self.gate.get_required(&ROLES, id).await?;
        let mut role: Role = record.to_model()?;
        role.is_active = is_active;
        role.updated_at = Utc::now();
        self.gate
            .update(&ROLES, id, serde_json::to_value(&role)?)
            .await?;
        Ok(role)
    }

    pub async fn remove_role(&self, id: Uuid) -> Result<(), AppError> {
        self.gate.remove(&ROLES, id).await
    }

    /// Resolve the given role ids to roles, dropping ids the tenant does not
    /// own. Inactive roles are returned and filtered by the evaluator.
    pub async fn roles_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Role>, AppError> {
        let mut roles = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(role) = self.get_role(*id).await? {
                roles.push(role);
            }
        }
        Ok(roles)
    }
}
