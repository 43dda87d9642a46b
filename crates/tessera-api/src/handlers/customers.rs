//! Customer records.
//!
//! A representative tenant-partitioned business entity, accessed purely
//! through the gate: every read and write inherits the caller's tenant
//! filter. Creation draws a document code from the tenant's active
//! `customer` rule when one exists.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tessera_core::{context, AppError};
use tessera_db::entity::CUSTOMERS;
use tessera_db::{Predicate, Record};
use uuid::Uuid;

use crate::auth::middleware::CurrentPrincipal;
use crate::error::{HttpAppError, ValidatedJson};
use crate::jobs::CUSTOMER_EXPORT_KIND;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCustomerRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub code: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ExportQueued {
    pub job_id: Uuid,
}

fn to_customer(record: &Record) -> Result<Customer, AppError> {
    record.to_model()
}

pub async fn create(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ValidatedJson(request): ValidatedJson<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<Customer>), HttpAppError> {
    state.authz.require(&principal, "customers.manage").await?;
    let tenant_id = context::require_tenant_id()?;

    // A configured rule numbers new customers; absence of one is fine.
    let code = match state.code_rules.active_for("customer").await? {
        Some(rule) => {
            let tenant = state
                .tenants
                .get(tenant_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("tenants {}", tenant_id)))?;
            Some(state.allocator.allocate(&rule, &tenant.timezone).await?)
        }
        None => None,
    };

    let now = Utc::now();
    let customer = Customer {
        id: Uuid::new_v4(),
        tenant_id,
        code,
        name: request.name,
        email: request.email,
        created_at: now,
        updated_at: now,
    };
    state
        .gate
        .create(&CUSTOMERS, serde_json::to_value(&customer)?)
        .await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn list(
    State(state): State<AppState>,
    CurrentPrincipal(_principal): CurrentPrincipal,
) -> Result<Json<Vec<Customer>>, HttpAppError> {
    let customers = state
        .gate
        .find(&CUSTOMERS, &Predicate::All)
        .await?
        .iter()
        .map(to_customer)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(customers))
}

pub async fn get(
    State(state): State<AppState>,
    CurrentPrincipal(_principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
) -> Result<Json<Customer>, HttpAppError> {
    let record = state.gate.get_required(&CUSTOMERS, id).await?;
    Ok(Json(to_customer(&record)?))
}

pub async fn update(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateCustomerRequest>,
) -> Result<Json<Customer>, HttpAppError> {
    state.authz.require(&principal, "customers.manage").await?;

    let record = state.gate.get_required(&CUSTOMERS, id).await?;
    let mut customer = to_customer(&record)?;
    if let Some(name) = request.name {
        customer.name = name;
    }
    if let Some(email) = request.email {
        customer.email = Some(email);
    }
    customer.updated_at = Utc::now();
    state
        .gate
        .update(&CUSTOMERS, id, serde_json::to_value(&customer)?)
        .await?;
    Ok(Json(customer))
}

pub async fn remove(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HttpAppError> {
    state.authz.require(&principal, "customers.manage").await?;
    state.gate.remove(&CUSTOMERS, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Queue a background export of the tenant's customers. The job runs under
/// the enqueuing caller's tenant, never the worker's.
pub async fn export(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<(StatusCode, Json<ExportQueued>), HttpAppError> {
    state.authz.require(&principal, "customers.manage").await?;
    let job = state
        .queue
        .enqueue(CUSTOMER_EXPORT_KIND, json!({}))
        .await?;
    Ok((StatusCode::ACCEPTED, Json(ExportQueued { job_id: job.id })))
}
