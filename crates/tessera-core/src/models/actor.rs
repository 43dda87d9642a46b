use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Principal;

/// A tenant-scoped user account. `password_digest` is a PHC string whose
/// prefix names the hashing algorithm; it never leaves the data layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantUser {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub username: String,
    pub password_digest: String,
    pub is_tenant_admin: bool,
    pub is_active: bool,
    pub role_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantUser {
    pub fn to_principal(&self) -> Principal {
        Principal::TenantUser {
            id: self.id,
            tenant_id: self.tenant_id,
            username: self.username.clone(),
            is_tenant_admin: self.is_tenant_admin,
            is_active: self.is_active,
            role_ids: self.role_ids.clone(),
        }
    }
}

/// A platform operator account. Not owned by any tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformAdmin {
    pub id: Uuid,
    pub username: String,
    pub password_digest: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlatformAdmin {
    pub fn to_principal(&self) -> Principal {
        Principal::PlatformAdmin {
            id: self.id,
            username: self.username.clone(),
            is_active: self.is_active,
        }
    }
}
