//! Typed repositories.
//!
//! Most repositories sit on the [`Gate`](crate::gate::Gate) and inherit its
//! context-driven tenant filtering. The tenant and actor repositories are
//! the exception: identity resolution runs before a request has a context,
//! so they address the store with explicit scopes and are only reachable
//! from the admission and auth paths.

pub mod actors;
pub mod code_rules;
pub mod roles;
pub mod tenants;

pub use actors::ActorRepository;
pub use code_rules::CodeRuleRepository;
pub use roles::RoleRepository;
pub use tenants::TenantRepository;
