//! Shared test fixtures: an app over the in-memory store, plus seeding and
//! login shortcuts.

#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};

use axum_test::TestServer;
use serde_json::{json, Value};
use tracing_subscriber::fmt::MakeWriter;
use tessera_api::auth::password;
use tessera_api::setup::{build_router, build_state};
use tessera_api::AppState;
use tessera_core::models::Tenant;
use tessera_core::{Config, StoreKind};
use uuid::Uuid;

pub fn test_config() -> Config {
    Config {
        server_port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        environment: "test".to_string(),
        store_kind: StoreKind::Memory,
        database_url: None,
        db_max_connections: 1,
        db_timeout_seconds: 1,
        tenant_access_secret: "test-tenant-access-0123456789-0123456789".to_string(),
        tenant_refresh_secret: "test-tenant-refresh-0123456789-0123456789".to_string(),
        platform_access_secret: "test-platform-access-0123456789-0123456789".to_string(),
        platform_refresh_secret: "test-platform-refresh-0123456789-0123456789".to_string(),
        access_token_ttl_minutes: 15,
        refresh_token_ttl_hours: 24,
        // High enough that tests never trip it by accident.
        http_rate_limit_per_minute: 100_000,
        http_tenant_rate_limit_per_minute: None,
        auth_failure_limit: 3,
        auth_failure_window_secs: 900,
        job_queue_max_workers: 1,
        job_queue_poll_interval_ms: 10,
        job_queue_max_retries: 3,
        sequence_retry_attempts: 4,
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

pub async fn spawn_app_with(config: Config) -> TestApp {
    let state = build_state(config).await.expect("state should build");
    let server = TestServer::new(build_router(state.clone())).expect("server should start");
    TestApp { server, state }
}

impl TestApp {
    /// Seed a tenant with one account and return the tenant plus the
    /// account's access token.
    pub async fn seed_tenant(&self, slug: &str, is_tenant_admin: bool) -> (Tenant, String) {
        let tenant = self
            .state
            .tenants
            .create(slug, &format!("{} Inc", slug), "UTC")
            .await
            .expect("tenant should be created");
        self.seed_user(tenant.id, "alice", "s3cret!", is_tenant_admin)
            .await;
        let token = self
            .login_token(Some(slug), "alice", "s3cret!")
            .await;
        (tenant, token)
    }

    pub async fn seed_user(
        &self,
        tenant_id: Uuid,
        username: &str,
        pass: &str,
        is_tenant_admin: bool,
    ) -> Uuid {
        let digest = password::hash_password(pass).expect("hashing should succeed");
        self.state
            .actors
            .create_tenant_user(tenant_id, username, &digest, is_tenant_admin)
            .await
            .expect("user should be created")
            .id
    }

    pub async fn seed_platform_admin(&self, username: &str, pass: &str) -> Uuid {
        let digest = password::hash_password(pass).expect("hashing should succeed");
        self.state
            .actors
            .create_platform_admin(username, &digest)
            .await
            .expect("admin should be created")
            .id
    }

    pub async fn login(
        &self,
        tenant_slug: Option<&str>,
        username: &str,
        pass: &str,
    ) -> Value {
        let response = self
            .server
            .post("/api/v1/auth/login")
            .json(&json!({
                "tenant_slug": tenant_slug,
                "username": username,
                "password": pass,
            }))
            .await;
        assert_eq!(response.status_code(), 200, "login failed: {}", response.text());
        response.json::<Value>()
    }

    pub async fn login_token(
        &self,
        tenant_slug: Option<&str>,
        username: &str,
        pass: &str,
    ) -> String {
        self.login(tenant_slug, username, pass).await["access_token"]
            .as_str()
            .expect("login response should carry an access token")
            .to_string()
    }
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Collects formatted tracing output so tests can assert on emitted events.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("log capture poisoned")).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .expect("log capture poisoned")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> LogCapture {
        self.clone()
    }
}
