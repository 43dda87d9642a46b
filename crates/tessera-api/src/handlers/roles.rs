//! Permission catalogue and role management, per tenant.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tessera_core::models::{Permission, Role};
use tessera_core::AppError;
use uuid::Uuid;

use crate::auth::middleware::CurrentPrincipal;
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePermissionRequest {
    pub code: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub permission_codes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetPermissionsRequest {
    pub permission_codes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

pub async fn create_permission(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ValidatedJson(request): ValidatedJson<CreatePermissionRequest>,
) -> Result<(StatusCode, Json<Permission>), HttpAppError> {
    state.authz.require_tenant_admin(&principal)?;
    let permission = state
        .roles
        .create_permission(&request.code, &request.description)
        .await?;
    Ok((StatusCode::CREATED, Json(permission)))
}

pub async fn list_permissions(
    State(state): State<AppState>,
    CurrentPrincipal(_principal): CurrentPrincipal,
) -> Result<Json<Vec<Permission>>, HttpAppError> {
    Ok(Json(state.roles.list_permissions().await?))
}

pub async fn create_role(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ValidatedJson(request): ValidatedJson<CreateRoleRequest>,
) -> Result<(StatusCode, Json<Role>), HttpAppError> {
    state.authz.require_tenant_admin(&principal)?;
    let role = state
        .roles
        .create_role(&request.name, request.permission_codes)
        .await?;
    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn list_roles(
    State(state): State<AppState>,
    CurrentPrincipal(_principal): CurrentPrincipal,
) -> Result<Json<Vec<Role>>, HttpAppError> {
    Ok(Json(state.roles.list_roles().await?))
}

pub async fn get_role(
    State(state): State<AppState>,
    CurrentPrincipal(_principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
) -> Result<Json<Role>, HttpAppError> {
    let role = state
        .roles
        .get_role(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("roles {}", id)))?;
    Ok(Json(role))
}

pub async fn set_role_permissions(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<SetPermissionsRequest>,
) -> Result<Json<Role>, HttpAppError> {
    state.authz.require_tenant_admin(&principal)?;
    let role = state
        .roles
        .set_role_permissions(id, request.permission_codes)
        .await?;
    Ok(Json(role))
}

pub async fn set_role_active(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<SetActiveRequest>,
) -> Result<Json<Role>, HttpAppError> {
    state.authz.require_tenant_admin(&principal)?;
    Ok(Json(state.roles.set_role_active(id, request.is_active).await?))
}

pub async fn remove_role(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HttpAppError> {
    state.authz.require_tenant_admin(&principal)?;
    state.roles.remove_role(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
