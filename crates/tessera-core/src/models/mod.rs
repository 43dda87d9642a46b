pub mod actor;
pub mod code_rule;
pub mod job;
pub mod principal;
pub mod role;
pub mod tenant;

pub use actor::{PlatformAdmin, TenantUser};
pub use code_rule::{CodeRule, ResetPolicy, RuleComponent};
pub use job::{Job, JobEnvelope, JobStatus};
pub use principal::{ActorKind, Principal};
pub use role::{Permission, Role};
pub use tenant::{Tenant, TenantStatus};
