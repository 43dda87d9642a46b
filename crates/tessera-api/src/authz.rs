//! Authorization evaluation.
//!
//! Decision order: inactive actors are refused outright; platform admins
//! may do anything; tenant admins may do anything inside their tenant;
//! everyone else needs the permission in the union of their active roles.
//! Role ids pointing at another tenant's roles resolve to nothing because
//! role lookup goes through the gate.

use std::collections::HashSet;

use tessera_core::{context, AppError, Principal};
use tessera_db::repos::RoleRepository;

/// The permission set an actor holds, resolved once per decision.
enum Grants {
    /// Platform and tenant admins: every check passes.
    All,
    Set(HashSet<String>),
}

impl Grants {
    fn contains(&self, permission: &str) -> bool {
        match self {
            Grants::All => true,
            Grants::Set(codes) => codes.contains(permission),
        }
    }
}

#[derive(Clone)]
pub struct Authorizer {
    roles: RoleRepository,
}

impl Authorizer {
    pub fn new(roles: RoleRepository) -> Self {
        Self { roles }
    }

    async fn resolve(&self, principal: &Principal) -> Result<Grants, AppError> {
        if !principal.is_active() {
            return Err(AppError::AuthRequired(
                "account is deactivated".to_string(),
            ));
        }
        match principal {
            Principal::PlatformAdmin { .. } => Ok(Grants::All),
            Principal::TenantUser {
                tenant_id,
                is_tenant_admin,
                role_ids,
                ..
            } => {
                // Admin standing ends at the tenant boundary: the blanket
                // grant holds only under the actor's own bound tenant.
                if *is_tenant_admin && context::require()?.tenant_id == Some(*tenant_id) {
                    return Ok(Grants::All);
                }
                let roles = self.roles.roles_by_ids(role_ids).await?;
                let codes = roles
                    .into_iter()
                    .filter(|role| role.is_active)
                    .flat_map(|role| role.permission_codes)
                    .collect();
                Ok(Grants::Set(codes))
            }
        }
    }

    pub async fn allowed(
        &self,
        principal: &Principal,
        permission: &str,
    ) -> Result<bool, AppError> {
        Ok(self.resolve(principal).await?.contains(permission))
    }

    pub async fn allowed_any(
        &self,
        principal: &Principal,
        permissions: &[&str],
    ) -> Result<bool, AppError> {
        let grants = self.resolve(principal).await?;
        Ok(permissions.iter().any(|p| grants.contains(p)))
    }

    pub async fn allowed_all(
        &self,
        principal: &Principal,
        permissions: &[&str],
    ) -> Result<bool, AppError> {
        let grants = self.resolve(principal).await?;
        Ok(permissions.iter().all(|p| grants.contains(p)))
    }

    /// Require `permission` for `principal`, or fail `NotAuthorized`.
    pub async fn require(&self, principal: &Principal, permission: &str) -> Result<(), AppError> {
        if self.allowed(principal, permission).await? {
            Ok(())
        } else {
            Err(AppError::NotAuthorized(format!(
                "missing permission '{}'",
                permission
            )))
        }
    }

    /// Tenant administration: tenant admins and platform admins only.
    pub fn require_tenant_admin(&self, principal: &Principal) -> Result<(), AppError> {
        if !principal.is_active() {
            return Err(AppError::AuthRequired(
                "account is deactivated".to_string(),
            ));
        }
        if principal.is_platform_admin() || principal.is_tenant_admin() {
            Ok(())
        } else {
            Err(AppError::NotAuthorized(
                "tenant administration requires an admin".to_string(),
            ))
        }
    }

    /// Platform administration only.
    pub fn require_platform_admin(&self, principal: &Principal) -> Result<(), AppError> {
        if !principal.is_active() {
            return Err(AppError::AuthRequired(
                "account is deactivated".to_string(),
            ));
        }
        if principal.is_platform_admin() {
            Ok(())
        } else {
            Err(AppError::NotAuthorized(
                "platform administration required".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tessera_core::{context, TenantContext};
    use tessera_db::store::MemoryBackend;
    use tessera_db::Gate;
    use uuid::Uuid;

    fn authorizer() -> Authorizer {
        Authorizer::new(RoleRepository::new(Gate::new(Arc::new(MemoryBackend::new()))))
    }

    fn ctx(tenant: Uuid) -> TenantContext {
        TenantContext::tenant_user(tenant, Uuid::new_v4(), "req-authz")
    }

    fn user(tenant: Uuid, role_ids: Vec<Uuid>, is_admin: bool) -> Principal {
        Principal::TenantUser {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            username: "alice".to_string(),
            is_tenant_admin: is_admin,
            is_active: true,
            role_ids,
        }
    }

    #[tokio::test]
    async fn platform_admin_is_always_allowed() {
        let authz = authorizer();
        let admin = Principal::PlatformAdmin {
            id: Uuid::new_v4(),
            username: "root".to_string(),
            is_active: true,
        };
        authz.require(&admin, "anything.at.all").await.unwrap();
        assert!(authz.allowed(&admin, "something.else").await.unwrap());
    }

    #[tokio::test]
    async fn tenant_admin_is_allowed_without_roles() {
        let authz = authorizer();
        let tenant = Uuid::new_v4();
        context::scope(ctx(tenant), async {
            authz
                .require(&user(tenant, vec![], true), "invoice.create")
                .await
        })
        .await
        .unwrap()
        .unwrap();
    }

    #[tokio::test]
    async fn tenant_admin_standing_ends_at_the_tenant_boundary() {
        let authz = authorizer();
        let home = Uuid::new_v4();
        let admin = user(home, vec![], true);

        // Evaluated under a different bound tenant, the blanket grant does
        // not apply and no roles resolve there either.
        context::scope(ctx(Uuid::new_v4()), async {
            assert!(!authz.allowed(&admin, "invoice.create").await?);
            let err = authz.require(&admin, "invoice.create").await.unwrap_err();
            assert!(matches!(err, AppError::NotAuthorized(_)));
            Ok::<_, AppError>(())
        })
        .await
        .unwrap()
        .unwrap();

        // Under the home tenant the grant holds.
        context::scope(ctx(home), async {
            authz.require(&admin, "invoice.create").await
        })
        .await
        .unwrap()
        .unwrap();
    }

    #[tokio::test]
    async fn permission_comes_from_active_roles_only() {
        let authz = authorizer();
        let tenant = Uuid::new_v4();

        context::scope(ctx(tenant), async {
            authz
                .roles
                .create_permission("invoice.create", "Create invoices")
                .await?;
            let role = authz
                .roles
                .create_role("clerk", vec!["invoice.create".to_string()])
                .await?;

            let principal = user(tenant, vec![role.id], false);
            authz.require(&principal, "invoice.create").await?;

            // Missing permission still refused.
            let err = authz
                .require(&principal, "invoice.delete")
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::NotAuthorized(_)));

            // Deactivating the role withdraws the grant.
            authz.roles.set_role_active(role.id, false).await?;
            let err = authz
                .require(&principal, "invoice.create")
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::NotAuthorized(_)));
            Ok::<_, AppError>(())
        })
        .await
        .unwrap()
        .unwrap();
    }

    #[tokio::test]
    async fn any_and_all_resolve_once_over_the_union() {
        let authz = authorizer();
        let tenant = Uuid::new_v4();

        context::scope(ctx(tenant), async {
            authz
                .roles
                .create_permission("invoice.create", "")
                .await?;
            authz.roles.create_permission("invoice.read", "").await?;
            let role = authz
                .roles
                .create_role(
                    "clerk",
                    vec!["invoice.create".to_string(), "invoice.read".to_string()],
                )
                .await?;
            let principal = user(tenant, vec![role.id], false);

            assert!(
                authz
                    .allowed_all(&principal, &["invoice.create", "invoice.read"])
                    .await?
            );
            assert!(
                !authz
                    .allowed_all(&principal, &["invoice.create", "invoice.delete"])
                    .await?
            );
            assert!(
                authz
                    .allowed_any(&principal, &["invoice.delete", "invoice.read"])
                    .await?
            );
            assert!(!authz.allowed_any(&principal, &["invoice.delete"]).await?);
            Ok::<_, AppError>(())
        })
        .await
        .unwrap()
        .unwrap();
    }

    #[tokio::test]
    async fn inactive_actor_is_refused_before_any_grant() {
        let authz = authorizer();
        let principal = Principal::TenantUser {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            username: "alice".to_string(),
            is_tenant_admin: true,
            is_active: false,
            role_ids: vec![],
        };
        let err = authz.require(&principal, "x").await.unwrap_err();
        assert!(matches!(err, AppError::AuthRequired(_)));
        assert!(authz.allowed(&principal, "x").await.is_err());
    }
}
