//! Tenant binding requirement for tenant-scoped routes.
//!
//! Tenant users always arrive with their token's tenant bound. Platform
//! admins may be admitted without one; on routes that operate on
//! tenant-partitioned data that is a caller error, answered with 400 before
//! any handler runs instead of surfacing as a context failure at the gate.

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tessera_core::{context, AppError};

use crate::error::HttpAppError;

/// Runs inside admission, where the context is already established.
pub async fn require_bound_tenant(request: Request, next: Next) -> Response {
    match context::get_or_none() {
        Some(ctx) if ctx.tenant_id.is_none() => {
            HttpAppError(AppError::TenantRequired).into_response()
        }
        // Without a context at all, the gate fails closed downstream.
        _ => next.run(request).await,
    }
}
