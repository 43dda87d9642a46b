//! Token issuance and verification.
//!
//! Tokens are HS256 JWTs. Every (actor kind, token use) pair signs with its
//! own secret, so a tenant-user token can never verify as a platform-admin
//! token (or a refresh token as an access token): the signature check fails
//! before any claim is inspected. Verification additionally requires that
//! the claims name the actor kind belonging to the key that verified.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tessera_core::models::ActorKind;
use tessera_core::{AppError, Config, Principal};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenUse {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub kind: ActorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
    pub token_use: TokenUse,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

#[derive(Clone)]
pub struct TokenService {
    tenant_access: KeyPair,
    tenant_refresh: KeyPair,
    platform_access: KeyPair,
    platform_refresh: KeyPair,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &Config) -> Self {
        Self {
            tenant_access: KeyPair::from_secret(&config.tenant_access_secret),
            tenant_refresh: KeyPair::from_secret(&config.tenant_refresh_secret),
            platform_access: KeyPair::from_secret(&config.platform_access_secret),
            platform_refresh: KeyPair::from_secret(&config.platform_refresh_secret),
            access_ttl: Duration::minutes(config.access_token_ttl_minutes),
            refresh_ttl: Duration::hours(config.refresh_token_ttl_hours),
        }
    }

    fn keys(&self, kind: ActorKind, token_use: TokenUse) -> &KeyPair {
        match (kind, token_use) {
            (ActorKind::TenantUser, TokenUse::Access) => &self.tenant_access,
            (ActorKind::TenantUser, TokenUse::Refresh) => &self.tenant_refresh,
            (ActorKind::PlatformAdmin, TokenUse::Access) => &self.platform_access,
            (ActorKind::PlatformAdmin, TokenUse::Refresh) => &self.platform_refresh,
        }
    }

    fn claims_for(&self, principal: &Principal, token_use: TokenUse) -> Claims {
        let now = Utc::now();
        let ttl = match token_use {
            TokenUse::Access => self.access_ttl,
            TokenUse::Refresh => self.refresh_ttl,
        };
        Claims {
            sub: principal.id(),
            kind: principal.actor_kind(),
            tenant_id: principal.tenant_id(),
            token_use,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    fn issue(&self, principal: &Principal, token_use: TokenUse) -> Result<String, AppError> {
        let claims = self.claims_for(principal, token_use);
        let key = &self.keys(claims.kind, token_use).encoding;
        encode(&Header::new(Algorithm::HS256), &claims, key)
            .map_err(|e| AppError::Internal(format!("token signing failed: {}", e)))
    }

    pub fn issue_access(&self, principal: &Principal) -> Result<String, AppError> {
        self.issue(principal, TokenUse::Access)
    }

    pub fn issue_refresh(&self, principal: &Principal) -> Result<String, AppError> {
        self.issue(principal, TokenUse::Refresh)
    }

    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    /// Verify against one kind's key. `Ok(None)` means the signature did not
    /// match this key and the next kind should be tried; any other failure
    /// is final.
    fn try_verify(
        &self,
        token: &str,
        kind: ActorKind,
        expected: TokenUse,
    ) -> Result<Option<Claims>, AppError> {
        let key = &self.keys(kind, expected).decoding;
        let validation = Validation::new(Algorithm::HS256);
        match decode::<Claims>(token, key, &validation) {
            Ok(data) => {
                // Claims that name a kind other than the verifying key's are
                // forged or misrouted, never valid.
                if data.claims.kind != kind {
                    return Err(AppError::TokenInvalid(
                        "token kind does not match its signing key".to_string(),
                    ));
                }
                if data.claims.token_use != expected {
                    return Err(AppError::TokenInvalid(
                        "token used for the wrong purpose".to_string(),
                    ));
                }
                Ok(Some(data.claims))
            }
            Err(e) => match e.kind() {
                ErrorKind::InvalidSignature => Ok(None),
                ErrorKind::ExpiredSignature => Err(AppError::TokenExpired),
                _ => Err(AppError::TokenInvalid(e.to_string())),
            },
        }
    }

    /// The claimed kind is untrusted until a signature checks out, so each
    /// kind's key is tried in turn.
    fn verify(&self, token: &str, expected: TokenUse) -> Result<Claims, AppError> {
        for kind in [ActorKind::TenantUser, ActorKind::PlatformAdmin] {
            if let Some(claims) = self.try_verify(token, kind, expected)? {
                return Ok(claims);
            }
        }
        Err(AppError::TokenInvalid(
            "signature verification failed".to_string(),
        ))
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, AppError> {
        self.verify(token, TokenUse::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, AppError> {
        self.verify(token, TokenUse::Refresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::StoreKind;

    fn config() -> Config {
        Config {
            server_port: 0,
            cors_origins: vec![],
            environment: "test".to_string(),
            store_kind: StoreKind::Memory,
            database_url: None,
            db_max_connections: 1,
            db_timeout_seconds: 1,
            tenant_access_secret: "a".repeat(48),
            tenant_refresh_secret: "b".repeat(48),
            platform_access_secret: "c".repeat(48),
            platform_refresh_secret: "d".repeat(48),
            access_token_ttl_minutes: 15,
            refresh_token_ttl_hours: 24,
            http_rate_limit_per_minute: 100,
            http_tenant_rate_limit_per_minute: None,
            auth_failure_limit: 5,
            auth_failure_window_secs: 900,
            job_queue_max_workers: 1,
            job_queue_poll_interval_ms: 10,
            job_queue_max_retries: 3,
            sequence_retry_attempts: 4,
        }
    }

    fn principal() -> Principal {
        Principal::TenantUser {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            username: "alice".to_string(),
            is_tenant_admin: false,
            is_active: true,
            role_ids: vec![],
        }
    }

    fn platform_principal() -> Principal {
        Principal::PlatformAdmin {
            id: Uuid::new_v4(),
            username: "root".to_string(),
            is_active: true,
        }
    }

    #[test]
    fn access_token_round_trips() {
        let service = TokenService::new(&config());
        let principal = principal();
        let token = service.issue_access(&principal).unwrap();
        let claims = service.verify_access(&token).unwrap();
        assert_eq!(claims.sub, principal.id());
        assert_eq!(claims.tenant_id, principal.tenant_id());
        assert_eq!(claims.kind, ActorKind::TenantUser);
    }

    #[test]
    fn platform_token_round_trips_on_its_own_key() {
        let service = TokenService::new(&config());
        let principal = platform_principal();
        let token = service.issue_access(&principal).unwrap();
        let claims = service.verify_access(&token).unwrap();
        assert_eq!(claims.sub, principal.id());
        assert_eq!(claims.kind, ActorKind::PlatformAdmin);
        assert_eq!(claims.tenant_id, None);
    }

    #[test]
    fn refresh_token_never_passes_access_verification() {
        let service = TokenService::new(&config());
        let refresh = service.issue_refresh(&principal()).unwrap();
        let err = service.verify_access(&refresh).unwrap_err();
        assert!(matches!(err, AppError::TokenInvalid(_)));
    }

    #[test]
    fn access_token_never_passes_refresh_verification() {
        let service = TokenService::new(&config());
        let access = service.issue_access(&principal()).unwrap();
        let err = service.verify_refresh(&access).unwrap_err();
        assert!(matches!(err, AppError::TokenInvalid(_)));
    }

    #[test]
    fn tenant_key_cannot_mint_a_platform_token() {
        let config = config();
        let service = TokenService::new(&config);

        // Claims naming a platform admin, signed with the tenant-user
        // access secret. Holding that secret must not confer platform
        // standing.
        let now = Utc::now();
        let claims = Claims {
            sub: Uuid::new_v4(),
            kind: ActorKind::PlatformAdmin,
            tenant_id: None,
            token_use: TokenUse::Access,
            iat: now.timestamp(),
            exp: (now + Duration::minutes(15)).timestamp(),
        };
        let forged = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(config.tenant_access_secret.as_bytes()),
        )
        .unwrap();

        let err = service.verify_access(&forged).unwrap_err();
        assert!(matches!(err, AppError::TokenInvalid(_)));
    }

    #[test]
    fn platform_key_cannot_mint_a_tenant_token() {
        let config = config();
        let service = TokenService::new(&config);

        let now = Utc::now();
        let claims = Claims {
            sub: Uuid::new_v4(),
            kind: ActorKind::TenantUser,
            tenant_id: Some(Uuid::new_v4()),
            token_use: TokenUse::Access,
            iat: now.timestamp(),
            exp: (now + Duration::minutes(15)).timestamp(),
        };
        let forged = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(config.platform_access_secret.as_bytes()),
        )
        .unwrap();

        let err = service.verify_access(&forged).unwrap_err();
        assert!(matches!(err, AppError::TokenInvalid(_)));
    }

    #[test]
    fn garbage_is_invalid() {
        let service = TokenService::new(&config());
        assert!(matches!(
            service.verify_access("not-a-token"),
            Err(AppError::TokenInvalid(_))
        ));
    }
}
