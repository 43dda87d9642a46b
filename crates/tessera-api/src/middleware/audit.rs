//! Audit log events.
//!
//! Security-relevant events are emitted on the `audit` tracing target so
//! they can be routed and retained separately from application logs. Never
//! log credentials or token material here.

use std::time::Duration;

use tessera_core::{AppError, TenantContext};
use uuid::Uuid;

pub fn log_login_success(actor_id: Uuid, tenant_id: Option<Uuid>, username: &str) {
    tracing::info!(
        target: "audit",
        actor_id = %actor_id,
        tenant_id = ?tenant_id,
        username = username,
        "login succeeded"
    );
}

pub fn log_login_failure(tenant_slug: Option<&str>, username: &str, reason: &str) {
    tracing::warn!(
        target: "audit",
        tenant_slug = ?tenant_slug,
        username = username,
        reason = reason,
        "login failed"
    );
}

/// One record per admitted request, emitted when the handler returns.
pub fn log_request_completed(
    ctx: &TenantContext,
    method: &str,
    path: &str,
    status: u16,
    error_kind: Option<&str>,
    elapsed: Duration,
) {
    tracing::info!(
        target: "audit",
        request_id = %ctx.request_id,
        actor_id = %ctx.actor_id,
        tenant_id = ?ctx.tenant_id,
        method = method,
        path = path,
        status = status,
        error_kind = error_kind,
        elapsed_ms = elapsed.as_millis() as u64,
        "request completed"
    );
}

pub fn log_admission_denied(path: &str, error: &AppError) {
    tracing::warn!(
        target: "audit",
        path = path,
        error_kind = error.kind(),
        "request admission denied"
    );
}

pub fn log_rate_limit_exceeded(key: &str, path: &str, limit: u32) {
    tracing::warn!(
        target: "audit",
        key = key,
        path = path,
        limit = limit,
        "rate limit exceeded"
    );
}
