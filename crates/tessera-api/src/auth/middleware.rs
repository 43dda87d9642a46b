//! Request admission.
//!
//! Every protected request passes through here in order: bearer token
//! verification, actor lookup, tenant status check, then establishment of
//! the task-local tenant context for the remainder of the request. Handlers
//! never see a request without a context; a context failure inside the
//! stack renders as 500, never as a silent fallback.

use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tessera_core::models::ActorKind;
use tessera_core::{context, AppError, Principal, TenantContext};
use uuid::Uuid;

use crate::error::HttpAppError;
use crate::middleware::audit;
use crate::middleware::request_id::RequestId;
use crate::state::AppState;

/// Optional tenant selector for platform admins acting on one tenant.
pub const TENANT_HEADER: &str = "x-tenant-id";

fn bearer_token(request: &Request) -> Result<&str, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::AuthRequired("missing Authorization header".to_string()))?;
    header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::AuthRequired("expected a bearer token".to_string()))
}

async fn admit(
    state: &AppState,
    request: &mut Request,
) -> Result<(TenantContext, Principal), AppError> {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    let token = bearer_token(request)?;
    let claims = state.tokens.verify_access(token)?;

    let (ctx, principal) = match claims.kind {
        ActorKind::TenantUser => {
            let tenant_id = claims
                .tenant_id
                .ok_or_else(|| AppError::TokenInvalid("tenant user token without tenant".to_string()))?;
            // Suspension takes effect on the next request, token or not.
            state.tenants.require_active(tenant_id).await.map_err(|e| match e {
                AppError::NotFound(_) => AppError::TokenInvalid("unknown tenant".to_string()),
                other => other,
            })?;
            let user = state
                .actors
                .get_tenant_user(tenant_id, claims.sub)
                .await?
                .ok_or_else(|| AppError::AuthRequired("account no longer exists".to_string()))?;
            if !user.is_active {
                return Err(AppError::AuthRequired("account is deactivated".to_string()));
            }
            (
                TenantContext::tenant_user(tenant_id, user.id, request_id),
                user.to_principal(),
            )
        }
        ActorKind::PlatformAdmin => {
            let admin = state
                .actors
                .get_platform_admin(claims.sub)
                .await?
                .ok_or_else(|| AppError::AuthRequired("account no longer exists".to_string()))?;
            if !admin.is_active {
                return Err(AppError::AuthRequired("account is deactivated".to_string()));
            }
            // An admin may bind to one tenant for this request via header.
            let tenant_id = match request
                .headers()
                .get(TENANT_HEADER)
                .and_then(|v| v.to_str().ok())
            {
                Some(raw) => {
                    let id: Uuid = raw
                        .parse()
                        .map_err(|_| AppError::Validation("invalid tenant selector".to_string()))?;
                    state.tenants.require_active(id).await?;
                    Some(id)
                }
                None => None,
            };
            (
                TenantContext::platform_admin(tenant_id, admin.id, request_id),
                admin.to_principal(),
            )
        }
    };

    request.extensions_mut().insert(principal.clone());
    Ok((ctx, principal))
}

pub async fn admission_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    match admit(&state, &mut request).await {
        Ok((ctx, _)) => {
            let audit_ctx = ctx.clone();
            match context::scope(ctx, next.run(request)).await {
                Ok(response) => {
                    audit::log_request_completed(
                        &audit_ctx,
                        &method,
                        &path,
                        response.status().as_u16(),
                        None,
                        started.elapsed(),
                    );
                    response
                }
                // A nested-scope violation is an invariant breakage, not a 4xx.
                Err(err) => {
                    audit::log_request_completed(
                        &audit_ctx,
                        &method,
                        &path,
                        500,
                        Some(err.kind()),
                        started.elapsed(),
                    );
                    HttpAppError(err).into_response()
                }
            }
        }
        Err(err) => {
            audit::log_admission_denied(&path, &err);
            HttpAppError(err).into_response()
        }
    }
}

/// Extractor for the admitted principal.
pub struct CurrentPrincipal(pub Principal);

impl<S> axum::extract::FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(CurrentPrincipal)
            .ok_or_else(|| {
                HttpAppError(AppError::AuthRequired(
                    "request was not admitted".to_string(),
                ))
            })
    }
}
