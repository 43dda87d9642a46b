//! Application assembly: backend selection, state construction, and the
//! router with its middleware stack.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::HeaderValue;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, patch, post, put};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tessera_core::{Config, StoreKind};
use tessera_db::repos::{ActorRepository, CodeRuleRepository, RoleRepository, TenantRepository};
use tessera_db::store::{PgBackend, StoreBackend};
use tessera_db::{CodeAllocator, Gate, MemoryBackend};
use tessera_worker::{JobQueue, JobQueueConfig};
use tower_http::cors::{Any, CorsLayer};

use crate::auth::middleware::admission_middleware;
use crate::auth::{AuthFailureLimiter, TokenService};
use crate::authz::Authorizer;
use crate::handlers::{auth, code_rules, customers, health, roles, tenants, users};
use crate::jobs::CustomerExportHandler;
use crate::middleware::rate_limit::{rate_limit_middleware, HttpRateLimiter};
use crate::middleware::request_id::request_id_middleware;
use crate::middleware::tenant_scope::require_bound_tenant;
use crate::state::AppState;

async fn build_store(config: &Config) -> Result<Arc<dyn StoreBackend>, anyhow::Error> {
    match config.store_kind {
        StoreKind::Memory => {
            tracing::info!("using in-memory store backend");
            Ok(Arc::new(MemoryBackend::new()))
        }
        StoreKind::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set when STORE_BACKEND=postgres")?;
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .acquire_timeout(Duration::from_secs(config.db_timeout_seconds))
                .connect(url)
                .await
                .context("failed to connect to PostgreSQL")?;
            let backend = PgBackend::new(pool);
            backend
                .run_migrations()
                .await
                .context("failed to run database migrations")?;
            tracing::info!("using PostgreSQL store backend");
            Ok(Arc::new(backend))
        }
    }
}

pub async fn build_state(config: Config) -> Result<AppState, anyhow::Error> {
    let store = build_store(&config).await?;
    let gate = Gate::new(store.clone());

    let mut queue = JobQueue::new(
        store.clone(),
        JobQueueConfig {
            max_workers: config.job_queue_max_workers,
            poll_interval_ms: config.job_queue_poll_interval_ms,
            max_retries: config.job_queue_max_retries,
        },
    );
    queue.register(Arc::new(CustomerExportHandler::new(gate.clone())));

    let roles = RoleRepository::new(gate.clone());
    Ok(AppState {
        tokens: TokenService::new(&config),
        auth_limiter: Arc::new(AuthFailureLimiter::new(
            config.auth_failure_limit,
            Duration::from_secs(config.auth_failure_window_secs),
        )),
        rate_limiter: Arc::new(HttpRateLimiter::new(
            config.http_rate_limit_per_minute,
            config.http_tenant_rate_limit_per_minute,
        )),
        allocator: Arc::new(CodeAllocator::new(
            store.clone(),
            config.sequence_retry_attempts,
        )),
        tenants: TenantRepository::new(store.clone()),
        actors: ActorRepository::new(store.clone()),
        authz: Authorizer::new(roles.clone()),
        roles,
        code_rules: CodeRuleRepository::new(gate.clone()),
        queue: Arc::new(queue),
        gate,
        config: Arc::new(config),
    })
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

pub fn build_router(state: AppState) -> Router {
    // Login and refresh are reachable without a token; everything else goes
    // through admission. The rate limiter sits inside admission on protected
    // routes so it can key on the established context.
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/auth/refresh", post(auth::refresh))
        .layer(from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ));

    // Routes a platform admin may hit without binding a tenant.
    let platform = Router::new()
        .route("/api/v1/auth/me", get(auth::me))
        .route("/api/v1/tenants", post(tenants::create).get(tenants::list))
        .route(
            "/api/v1/tenants/{id}",
            get(tenants::get).delete(tenants::remove),
        )
        .route("/api/v1/tenants/{id}/status", patch(tenants::set_status))
        .route("/api/v1/tenants/{id}/timezone", patch(tenants::set_timezone))
        .route("/api/v1/tenants/{id}/users", post(tenants::bootstrap_user));

    // Everything operating on tenant-partitioned data requires a bound
    // tenant; an unbound platform admin gets 400 here.
    let tenant_scoped = Router::new()
        .route("/api/v1/users", post(users::create).get(users::list))
        .route("/api/v1/users/{id}/roles", put(users::set_roles))
        .route("/api/v1/users/{id}/active", patch(users::set_active))
        .route(
            "/api/v1/permissions",
            post(roles::create_permission).get(roles::list_permissions),
        )
        .route(
            "/api/v1/roles",
            post(roles::create_role).get(roles::list_roles),
        )
        .route(
            "/api/v1/roles/{id}",
            get(roles::get_role).delete(roles::remove_role),
        )
        .route(
            "/api/v1/roles/{id}/permissions",
            put(roles::set_role_permissions),
        )
        .route("/api/v1/roles/{id}/active", patch(roles::set_role_active))
        .route(
            "/api/v1/code-rules",
            post(code_rules::create).get(code_rules::list),
        )
        .route(
            "/api/v1/code-rules/{id}",
            get(code_rules::get).delete(code_rules::remove),
        )
        .route(
            "/api/v1/code-rules/{id}/components",
            put(code_rules::set_components),
        )
        .route(
            "/api/v1/code-rules/{id}/active",
            patch(code_rules::set_active),
        )
        .route("/api/v1/codes/{entity}/allocate", post(code_rules::allocate))
        .route(
            "/api/v1/customers",
            post(customers::create).get(customers::list),
        )
        .route("/api/v1/customers/export", post(customers::export))
        .route(
            "/api/v1/customers/{id}",
            get(customers::get)
                .patch(customers::update)
                .delete(customers::remove),
        )
        .layer(from_fn(require_bound_tenant));

    let protected = platform
        .merge(tenant_scoped)
        .layer(from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(from_fn_with_state(state.clone(), admission_middleware));

    public
        .merge(protected)
        .layer(from_fn(request_id_middleware))
        .layer(cors_layer(&state.config))
        .with_state(state)
}
