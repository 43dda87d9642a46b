use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a tenant. Only active tenants admit requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Suspended,
    Inactive,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Active => "active",
            TenantStatus::Suspended => "suspended",
            TenantStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(TenantStatus::Active),
            "suspended" => Some(TenantStatus::Suspended),
            "inactive" => Some(TenantStatus::Inactive),
            _ => None,
        }
    }
}

/// A tenant of the platform. The id is the partition key for every
/// tenant-owned record; the slug is the stable external handle used in URLs
/// and login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub slug: String,
    pub display_name: String,
    pub status: TenantStatus,
    /// IANA timezone name, used when expanding date components in document
    /// code rules. Defaults to UTC.
    pub timezone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            TenantStatus::Active,
            TenantStatus::Suspended,
            TenantStatus::Inactive,
        ] {
            assert_eq!(TenantStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TenantStatus::parse("deleted"), None);
    }

    #[test]
    fn only_active_tenants_are_active() {
        let mut tenant = Tenant {
            id: Uuid::new_v4(),
            slug: "acme".to_string(),
            display_name: "Acme Corp".to_string(),
            status: TenantStatus::Active,
            timezone: "UTC".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(tenant.is_active());
        tenant.status = TenantStatus::Suspended;
        assert!(!tenant.is_active());
    }
}
