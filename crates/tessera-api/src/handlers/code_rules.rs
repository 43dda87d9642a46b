//! Document code rules and allocation.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tessera_core::models::{CodeRule, RuleComponent};
use tessera_core::{context, AppError};
use uuid::Uuid;

use crate::auth::middleware::CurrentPrincipal;
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateRuleRequest {
    pub entity: String,
    pub components: Vec<RuleComponent>,
}

#[derive(Debug, Deserialize)]
pub struct SetComponentsRequest {
    pub components: Vec<RuleComponent>,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct AllocatedCode {
    pub entity: String,
    pub code: String,
}

pub async fn create(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ValidatedJson(request): ValidatedJson<CreateRuleRequest>,
) -> Result<(StatusCode, Json<CodeRule>), HttpAppError> {
    state.authz.require_tenant_admin(&principal)?;
    let rule = state
        .code_rules
        .create(&request.entity, request.components)
        .await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

pub async fn list(
    State(state): State<AppState>,
    CurrentPrincipal(_principal): CurrentPrincipal,
) -> Result<Json<Vec<CodeRule>>, HttpAppError> {
    Ok(Json(state.code_rules.list().await?))
}

pub async fn get(
    State(state): State<AppState>,
    CurrentPrincipal(_principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
) -> Result<Json<CodeRule>, HttpAppError> {
    let rule = state
        .code_rules
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("code_rules {}", id)))?;
    Ok(Json(rule))
}

pub async fn set_components(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<SetComponentsRequest>,
) -> Result<Json<CodeRule>, HttpAppError> {
    state.authz.require_tenant_admin(&principal)?;
    let rule = state
        .code_rules
        .update_components(id, request.components)
        .await?;
    Ok(Json(rule))
}

pub async fn set_active(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<SetActiveRequest>,
) -> Result<Json<CodeRule>, HttpAppError> {
    state.authz.require_tenant_admin(&principal)?;
    Ok(Json(state.code_rules.set_active(id, request.is_active).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HttpAppError> {
    state.authz.require_tenant_admin(&principal)?;
    state.code_rules.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Issue the next code for an entity from the tenant's active rule. Each
/// issued code is unique within the rule's scope even under concurrency.
pub async fn allocate(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(entity): Path<String>,
) -> Result<Json<AllocatedCode>, HttpAppError> {
    state.authz.require(&principal, "codes.allocate").await?;

    let entity = entity.trim().to_lowercase();
    let rule = state
        .code_rules
        .active_for(&entity)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("no active code rule for '{}'", entity))
        })?;

    let tenant_id = context::require_tenant_id()?;
    let tenant = state
        .tenants
        .get(tenant_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("tenants {}", tenant_id)))?;

    let code = state.allocator.allocate(&rule, &tenant.timezone).await?;
    Ok(Json(AllocatedCode { entity, code }))
}
