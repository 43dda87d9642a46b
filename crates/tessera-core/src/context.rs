//! Task-local tenant context carrier.
//!
//! Every logical task (an admitted HTTP request, a background job dispatch)
//! owns one context slot. The slot is bound to the tokio task via
//! `task_local!`, never to a thread and never to a process global: two
//! concurrently executing tasks cannot observe each other's context, and the
//! slot dies with the scope on every exit path, including cancellation.
//!
//! The gate, the sequence allocator, and the job queue all read the context
//! synchronously at the point of call; nothing captures it into closures.

use std::cell::RefCell;
use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::ActorKind;

/// The transient per-task record: who is acting, for which tenant, under
/// which request. `tenant` is unbound only for platform admins on global
/// endpoints; tenant-partitioned data access fails `ContextMissing` in that
/// state rather than skipping the filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub tenant_id: Option<Uuid>,
    pub actor_id: Uuid,
    pub actor_kind: ActorKind,
    pub request_id: String,
}

impl TenantContext {
    pub fn tenant_user(tenant_id: Uuid, actor_id: Uuid, request_id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            actor_id,
            actor_kind: ActorKind::TenantUser,
            request_id: request_id.into(),
        }
    }

    pub fn platform_admin(
        tenant_id: Option<Uuid>,
        actor_id: Uuid,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id,
            actor_id,
            actor_kind: ActorKind::PlatformAdmin,
            request_id: request_id.into(),
        }
    }

    pub fn is_platform_admin(&self) -> bool {
        self.actor_kind == ActorKind::PlatformAdmin
    }
}

tokio::task_local! {
    static CONTEXT_SLOT: RefCell<Option<TenantContext>>;
}

/// Establish an empty context slot for the duration of `fut`.
///
/// Called at task boundaries (request admission, worker dispatch) so that
/// `set` has a place to write. The slot is dropped with the future on every
/// exit path.
pub async fn with_empty_slot<F>(fut: F) -> F::Output
where
    F: Future,
{
    CONTEXT_SLOT.scope(RefCell::new(None), fut).await
}

/// Run `fut` with `ctx` as the current tenant context.
///
/// Nesting is allowed iff the inner context is identical to the outer;
/// otherwise `ContextViolation`. Identical re-entry is idempotent.
pub async fn scope<F>(ctx: TenantContext, fut: F) -> Result<F::Output, AppError>
where
    F: Future,
{
    let outer = get_or_none();
    if let Some(existing) = outer {
        if existing != ctx {
            return Err(AppError::ContextViolation(
                "nested context scope differs from the enclosing scope".to_string(),
            ));
        }
    }
    Ok(CONTEXT_SLOT.scope(RefCell::new(Some(ctx)), fut).await)
}

/// Install `ctx` into the current task's slot.
///
/// A second `set` with a different tenant while one is present fails with
/// `ContextViolation`; a `set` with the same tenant extends (overwrites) the
/// slot. Calling `set` outside any slot region is a programmer error.
pub fn set(ctx: TenantContext) -> Result<(), AppError> {
    CONTEXT_SLOT
        .try_with(|slot| {
            let mut current = slot.borrow_mut();
            if let Some(existing) = current.as_ref() {
                if existing.tenant_id != ctx.tenant_id {
                    return Err(AppError::ContextViolation(
                        "context already bound to a different tenant".to_string(),
                    ));
                }
            }
            *current = Some(ctx);
            Ok(())
        })
        .map_err(|_| {
            AppError::ContextViolation("no context slot established for this task".to_string())
        })?
}

/// Return the current context, or none if unset.
pub fn get_or_none() -> Option<TenantContext> {
    CONTEXT_SLOT
        .try_with(|slot| slot.borrow().clone())
        .ok()
        .flatten()
}

/// Return the current context or fail with `ContextMissing`.
pub fn require() -> Result<TenantContext, AppError> {
    get_or_none().ok_or(AppError::ContextMissing)
}

/// Return the bound tenant id, failing `ContextMissing` when the context is
/// absent or unbound (platform admin on a global endpoint).
pub fn require_tenant_id() -> Result<Uuid, AppError> {
    require()?.tenant_id.ok_or(AppError::ContextMissing)
}
