//! Shared application state.

use std::sync::Arc;

use tessera_core::Config;
use tessera_db::repos::{ActorRepository, CodeRuleRepository, RoleRepository, TenantRepository};
use tessera_db::store::StoreBackend;
use tessera_db::{CodeAllocator, Gate};
use tessera_worker::JobQueue;

use crate::auth::{AuthFailureLimiter, TokenService};
use crate::authz::Authorizer;
use crate::middleware::rate_limit::HttpRateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gate: Gate,
    pub tenants: TenantRepository,
    pub actors: ActorRepository,
    pub roles: RoleRepository,
    pub code_rules: CodeRuleRepository,
    pub authz: Authorizer,
    pub allocator: Arc<CodeAllocator>,
    pub tokens: TokenService,
    pub auth_limiter: Arc<AuthFailureLimiter>,
    pub rate_limiter: Arc<HttpRateLimiter>,
    pub queue: Arc<JobQueue>,
}

impl AppState {
    pub fn store(&self) -> Arc<dyn StoreBackend> {
        self.gate.store()
    }
}
