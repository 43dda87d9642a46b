//! Tenant administration. Platform administrators only.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tessera_core::models::{Tenant, TenantStatus};
use tessera_core::AppError;
use uuid::Uuid;

use crate::auth::middleware::CurrentPrincipal;
use crate::auth::password;
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub slug: String,
    pub display_name: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: TenantStatus,
}

#[derive(Debug, Deserialize)]
pub struct SetTimezoneRequest {
    pub timezone: String,
}

#[derive(Debug, Deserialize)]
pub struct BootstrapUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub is_tenant_admin: bool,
}

#[derive(Debug, Serialize)]
pub struct BootstrapUserResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub username: String,
    pub is_tenant_admin: bool,
}

pub async fn create(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ValidatedJson(request): ValidatedJson<CreateTenantRequest>,
) -> Result<(StatusCode, Json<Tenant>), HttpAppError> {
    state.authz.require_platform_admin(&principal)?;
    let tenant = state
        .tenants
        .create(&request.slug, &request.display_name, &request.timezone)
        .await?;
    Ok((StatusCode::CREATED, Json(tenant)))
}

pub async fn list(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<Vec<Tenant>>, HttpAppError> {
    state.authz.require_platform_admin(&principal)?;
    Ok(Json(state.tenants.list().await?))
}

pub async fn get(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
) -> Result<Json<Tenant>, HttpAppError> {
    state.authz.require_platform_admin(&principal)?;
    let tenant = state
        .tenants
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("tenants {}", id)))?;
    Ok(Json(tenant))
}

pub async fn set_status(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<SetStatusRequest>,
) -> Result<Json<Tenant>, HttpAppError> {
    state.authz.require_platform_admin(&principal)?;
    Ok(Json(state.tenants.set_status(id, request.status).await?))
}

pub async fn set_timezone(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<SetTimezoneRequest>,
) -> Result<Json<Tenant>, HttpAppError> {
    state.authz.require_platform_admin(&principal)?;
    Ok(Json(state.tenants.set_timezone(id, &request.timezone).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HttpAppError> {
    state.authz.require_platform_admin(&principal)?;
    state.tenants.soft_remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create the first account inside a tenant, typically its admin. Later
/// accounts are created in-tenant by that admin.
pub async fn bootstrap_user(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<BootstrapUserRequest>,
) -> Result<(StatusCode, Json<BootstrapUserResponse>), HttpAppError> {
    state.authz.require_platform_admin(&principal)?;
    state.tenants.require_active(id).await?;

    let digest = password::hash_password(&request.password)?;
    let user = state
        .actors
        .create_tenant_user(id, &request.username, &digest, request.is_tenant_admin)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(BootstrapUserResponse {
            id: user.id,
            tenant_id: user.tenant_id,
            username: user.username,
            is_tenant_admin: user.is_tenant_admin,
        }),
    ))
}
