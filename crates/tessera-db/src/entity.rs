//! Entity definitions.
//!
//! Every kind of stored record is declared here once. The gate refuses to
//! touch an entity it does not know, and the partitioning declaration is
//! what drives mandatory tenant filtering.

/// Whether records of an entity belong to a tenant or to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partitioning {
    /// Every record carries a tenant id and is invisible outside it.
    TenantPartitioned,
    /// Platform-level records (tenants themselves, platform admins, jobs).
    Global,
}

/// Static description of a stored entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDef {
    /// Storage name; also the table name on the SQL backend.
    pub name: &'static str,
    pub partitioning: Partitioning,
    /// Soft-deleted records are retained with a removal timestamp and
    /// excluded from normal reads.
    pub soft_delete: bool,
}

impl EntityDef {
    pub const fn is_tenant_partitioned(&self) -> bool {
        matches!(self.partitioning, Partitioning::TenantPartitioned)
    }
}

pub const TENANTS: EntityDef = EntityDef {
    name: "tenants",
    partitioning: Partitioning::Global,
    soft_delete: true,
};

pub const PLATFORM_ADMINS: EntityDef = EntityDef {
    name: "platform_admins",
    partitioning: Partitioning::Global,
    soft_delete: false,
};

pub const TENANT_USERS: EntityDef = EntityDef {
    name: "tenant_users",
    partitioning: Partitioning::TenantPartitioned,
    soft_delete: true,
};

pub const ROLES: EntityDef = EntityDef {
    name: "roles",
    partitioning: Partitioning::TenantPartitioned,
    soft_delete: true,
};

pub const PERMISSIONS: EntityDef = EntityDef {
    name: "permissions",
    partitioning: Partitioning::TenantPartitioned,
    soft_delete: false,
};

pub const CODE_RULES: EntityDef = EntityDef {
    name: "code_rules",
    partitioning: Partitioning::TenantPartitioned,
    soft_delete: true,
};

pub const CUSTOMERS: EntityDef = EntityDef {
    name: "customers",
    partitioning: Partitioning::TenantPartitioned,
    soft_delete: true,
};

pub const JOBS: EntityDef = EntityDef {
    name: "jobs",
    partitioning: Partitioning::Global,
    soft_delete: false,
};

/// All declared entities. The SQL backend provisions one table per entry.
pub const ALL: &[&EntityDef] = &[
    &TENANTS,
    &PLATFORM_ADMINS,
    &TENANT_USERS,
    &ROLES,
    &PERMISSIONS,
    &CODE_RULES,
    &CUSTOMERS,
    &JOBS,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = ALL.iter().map(|e| e.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ALL.len());
    }

    #[test]
    fn tenant_owned_entities_are_partitioned() {
        assert!(TENANT_USERS.is_tenant_partitioned());
        assert!(ROLES.is_tenant_partitioned());
        assert!(CUSTOMERS.is_tenant_partitioned());
        assert!(!TENANTS.is_tenant_partitioned());
        assert!(!JOBS.is_tenant_partitioned());
    }
}
