use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two kinds of authenticated actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    TenantUser,
    PlatformAdmin,
}

impl ActorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorKind::TenantUser => "tenant_user",
            ActorKind::PlatformAdmin => "platform_admin",
        }
    }
}

/// An authenticated identity, resolved from a verified access token.
///
/// Tenant users always carry their tenant; platform admins never do. Making
/// the two shapes distinct variants keeps "admin with a null tenant" out of
/// the type system entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
    TenantUser {
        id: Uuid,
        tenant_id: Uuid,
        username: String,
        is_tenant_admin: bool,
        is_active: bool,
        role_ids: Vec<Uuid>,
    },
    PlatformAdmin {
        id: Uuid,
        username: String,
        is_active: bool,
    },
}

impl Principal {
    pub fn id(&self) -> Uuid {
        match self {
            Principal::TenantUser { id, .. } => *id,
            Principal::PlatformAdmin { id, .. } => *id,
        }
    }

    pub fn username(&self) -> &str {
        match self {
            Principal::TenantUser { username, .. } => username,
            Principal::PlatformAdmin { username, .. } => username,
        }
    }

    pub fn tenant_id(&self) -> Option<Uuid> {
        match self {
            Principal::TenantUser { tenant_id, .. } => Some(*tenant_id),
            Principal::PlatformAdmin { .. } => None,
        }
    }

    pub fn actor_kind(&self) -> ActorKind {
        match self {
            Principal::TenantUser { .. } => ActorKind::TenantUser,
            Principal::PlatformAdmin { .. } => ActorKind::PlatformAdmin,
        }
    }

    pub fn is_active(&self) -> bool {
        match self {
            Principal::TenantUser { is_active, .. } => *is_active,
            Principal::PlatformAdmin { is_active, .. } => *is_active,
        }
    }

    pub fn is_platform_admin(&self) -> bool {
        matches!(self, Principal::PlatformAdmin { .. })
    }

    pub fn is_tenant_admin(&self) -> bool {
        matches!(
            self,
            Principal::TenantUser {
                is_tenant_admin: true,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_admin_has_no_tenant() {
        let principal = Principal::PlatformAdmin {
            id: Uuid::new_v4(),
            username: "root".to_string(),
            is_active: true,
        };
        assert_eq!(principal.tenant_id(), None);
        assert!(principal.is_platform_admin());
        assert!(!principal.is_tenant_admin());
    }

    #[test]
    fn tenant_user_serializes_with_kind_tag() {
        let principal = Principal::TenantUser {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            username: "alice".to_string(),
            is_tenant_admin: true,
            is_active: true,
            role_ids: vec![],
        };
        let json = serde_json::to_value(&principal).unwrap();
        assert_eq!(json["kind"], "tenant_user");
        assert!(principal.is_tenant_admin());
    }
}
