//! Tenant user management. Tenant admins act within their own tenant;
//! platform admins must bind a tenant first.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tessera_core::models::TenantUser;
use tessera_core::{context, AppError};
use uuid::Uuid;

use crate::auth::middleware::CurrentPrincipal;
use crate::auth::password;
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub is_tenant_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetRolesRequest {
    pub role_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// The public view of an account. The password digest never leaves the
/// server.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub username: String,
    pub is_tenant_admin: bool,
    pub is_active: bool,
    pub role_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TenantUser> for UserResponse {
    fn from(user: TenantUser) -> Self {
        Self {
            id: user.id,
            tenant_id: user.tenant_id,
            username: user.username,
            is_tenant_admin: user.is_tenant_admin,
            is_active: user.is_active,
            role_ids: user.role_ids,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

fn bound_tenant() -> Result<Uuid, AppError> {
    context::require_tenant_id().map_err(|_| {
        AppError::TenantRequired
    })
}

pub async fn create(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ValidatedJson(request): ValidatedJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), HttpAppError> {
    state.authz.require_tenant_admin(&principal)?;
    let tenant_id = bound_tenant()?;

    let digest = password::hash_password(&request.password)?;
    let user = state
        .actors
        .create_tenant_user(tenant_id, &request.username, &digest, request.is_tenant_admin)
        .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn list(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<Vec<UserResponse>>, HttpAppError> {
    state.authz.require_tenant_admin(&principal)?;
    let tenant_id = bound_tenant()?;
    let users = state
        .actors
        .list_tenant_users(tenant_id)
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();
    Ok(Json(users))
}

pub async fn set_roles(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<SetRolesRequest>,
) -> Result<Json<UserResponse>, HttpAppError> {
    state.authz.require_tenant_admin(&principal)?;
    let tenant_id = bound_tenant()?;

    // Only roles the tenant owns may be assigned; foreign ids resolve to
    // nothing and are rejected here rather than silently dropped.
    let resolved = state.roles.roles_by_ids(&request.role_ids).await?;
    if resolved.len() != request.role_ids.len() {
        return Err(HttpAppError(AppError::Validation(
            "one or more role ids are unknown".to_string(),
        )));
    }

    let user = state
        .actors
        .set_tenant_user_roles(tenant_id, id, request.role_ids)
        .await?;
    Ok(Json(user.into()))
}

pub async fn set_active(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<SetActiveRequest>,
) -> Result<Json<UserResponse>, HttpAppError> {
    state.authz.require_tenant_admin(&principal)?;
    let tenant_id = bound_tenant()?;

    // An admin cannot deactivate their own account.
    if id == principal.id() && !request.is_active {
        return Err(HttpAppError(AppError::Validation(
            "cannot deactivate your own account".to_string(),
        )));
    }

    let user = state
        .actors
        .set_tenant_user_active(tenant_id, id, request.is_active)
        .await?;
    Ok(Json(user.into()))
}
