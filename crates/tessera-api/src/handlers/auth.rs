//! Login, token refresh, and identity introspection.
//!
//! Login and refresh are public routes: no context exists yet, so every
//! lookup here scopes explicitly through the repositories. Failed logins
//! always report the same error and burn the same hashing work, whether the
//! tenant, the account, or the password was wrong.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tessera_core::models::ActorKind;
use tessera_core::{AppError, Principal};

use crate::auth::password;
use crate::auth::middleware::CurrentPrincipal;
use crate::error::{HttpAppError, ValidatedJson};
use crate::middleware::audit;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Absent for platform administrator logins.
    pub tenant_slug: Option<String>,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

fn failure_key(tenant_slug: Option<&str>, username: &str) -> String {
    format!("{}/{}", tenant_slug.unwrap_or("platform"), username)
}

fn invalid_credentials() -> AppError {
    AppError::AuthRequired("invalid credentials".to_string())
}

impl AppState {
    fn token_response(&self, principal: &Principal) -> Result<TokenResponse, AppError> {
        Ok(TokenResponse {
            access_token: self.tokens.issue_access(principal)?,
            refresh_token: self.tokens.issue_refresh(principal)?,
            token_type: "Bearer",
            expires_in: self.tokens.access_ttl_seconds(),
        })
    }
}

async fn resolve_login(
    state: &AppState,
    request: &LoginRequest,
) -> Result<Principal, AppError> {
    let username = request.username.trim().to_lowercase();

    match request.tenant_slug.as_deref() {
        Some(slug) => {
            let Some(tenant) = state.tenants.by_slug(slug).await? else {
                password::dummy_verify(&request.password);
                return Err(invalid_credentials());
            };
            if !tenant.is_active() {
                return Err(AppError::TenantSuspended);
            }
            let Some(user) = state.actors.find_tenant_user(tenant.id, &username).await? else {
                password::dummy_verify(&request.password);
                return Err(invalid_credentials());
            };
            if !password::verify_password(&request.password, &user.password_digest)? {
                return Err(invalid_credentials());
            }
            if !user.is_active {
                return Err(AppError::AuthRequired("account is deactivated".to_string()));
            }
            // Upgrade legacy digests on the way through.
            if password::needs_rehash(&user.password_digest) {
                let digest = password::hash_password(&request.password)?;
                state
                    .actors
                    .update_tenant_user_digest(tenant.id, user.id, &digest)
                    .await?;
            }
            Ok(user.to_principal())
        }
        None => {
            let Some(admin) = state.actors.find_platform_admin(&username).await? else {
                password::dummy_verify(&request.password);
                return Err(invalid_credentials());
            };
            if !password::verify_password(&request.password, &admin.password_digest)? {
                return Err(invalid_credentials());
            }
            if !admin.is_active {
                return Err(AppError::AuthRequired("account is deactivated".to_string()));
            }
            Ok(admin.to_principal())
        }
    }
}

pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Json<TokenResponse>, HttpAppError> {
    let key = failure_key(request.tenant_slug.as_deref(), &request.username);
    if state.auth_limiter.is_blocked(&key) {
        audit::log_login_failure(
            request.tenant_slug.as_deref(),
            &request.username,
            "too many failed attempts",
        );
        return Err(HttpAppError(AppError::RateLimited));
    }

    match resolve_login(&state, &request).await {
        Ok(principal) => {
            state.auth_limiter.clear(&key);
            audit::log_login_success(principal.id(), principal.tenant_id(), principal.username());
            Ok(Json(state.token_response(&principal)?))
        }
        Err(err) => {
            state.auth_limiter.record_failure(&key);
            audit::log_login_failure(
                request.tenant_slug.as_deref(),
                &request.username,
                err.kind(),
            );
            Err(HttpAppError(err))
        }
    }
}

/// Exchange a refresh token for a fresh pair. Actor and tenant state are
/// re-checked so a deactivation or suspension cuts the refresh chain.
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RefreshRequest>,
) -> Result<Json<TokenResponse>, HttpAppError> {
    let claims = state.tokens.verify_refresh(&request.refresh_token)?;

    let principal = match claims.kind {
        ActorKind::TenantUser => {
            let tenant_id = claims.tenant_id.ok_or_else(|| {
                AppError::TokenInvalid("tenant user token without tenant".to_string())
            })?;
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
                return Err(HttpAppError(AppError::AuthRequired(
                    "account is deactivated".to_string(),
                )));
            }
            user.to_principal()
        }
        ActorKind::PlatformAdmin => {
            let admin = state
                .actors
                .get_platform_admin(claims.sub)
                .await?
                .ok_or_else(|| AppError::AuthRequired("account no longer exists".to_string()))?;
            if !admin.is_active {
                return Err(HttpAppError(AppError::AuthRequired(
                    "account is deactivated".to_string(),
                )));
            }
            admin.to_principal()
        }
    };

    Ok(Json(state.token_response(&principal)?))
}

/// The admitted caller's own identity.
pub async fn me(
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Json<serde_json::Value> {
    let body = match &principal {
        Principal::TenantUser {
            id,
            tenant_id,
            username,
            is_tenant_admin,
            is_active,
            role_ids,
        } => json!({
            "kind": "tenant_user",
            "id": id,
            "tenant_id": tenant_id,
            "username": username,
            "is_tenant_admin": is_tenant_admin,
            "is_active": is_active,
            "role_ids": role_ids,
        }),
        Principal::PlatformAdmin {
            id,
            username,
            is_active,
        } => json!({
            "kind": "platform_admin",
            "id": id,
            "username": username,
            "is_active": is_active,
        }),
    };
    Json(body)
}
