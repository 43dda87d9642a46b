//! Request admission: token verification, tenant status, and account state
//! are all re-checked on every request.

mod helpers;

use helpers::{bearer, spawn_app, LogCapture};
use serde_json::{json, Value};
use tessera_core::models::TenantStatus;

#[tokio::test]
async fn missing_or_garbage_tokens_are_refused() {
    let app = spawn_app().await;

    let response = app.server.get("/api/v1/customers").await;
    assert_eq!(response.status_code(), 401);

    let response = app
        .server
        .get("/api/v1/customers")
        .add_header("Authorization", "Bearer not-a-token")
        .await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn suspension_takes_effect_on_the_next_request() {
    let app = spawn_app().await;
    let (tenant, token) = app.seed_tenant("acme", true).await;

    let response = app
        .server
        .get("/api/v1/customers")
        .add_header("Authorization", bearer(&token))
        .await;
    assert_eq!(response.status_code(), 200);

    app.state
        .tenants
        .set_status(tenant.id, TenantStatus::Suspended)
        .await
        .unwrap();

    // The token is still cryptographically valid; admission refuses anyway.
    let response = app
        .server
        .get("/api/v1/customers")
        .add_header("Authorization", bearer(&token))
        .await;
    assert_eq!(response.status_code(), 403);
    assert_eq!(response.json::<Value>()["code"], "TENANT_SUSPENDED");

    // Login is refused too.
    let response = app
        .server
        .post("/api/v1/auth/login")
        .json(&json!({"tenant_slug": "acme", "username": "alice", "password": "s3cret!"}))
        .await;
    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn a_refresh_token_is_not_an_access_token() {
    let app = spawn_app().await;
    let (_, _) = app.seed_tenant("acme", true).await;
    let tokens = app.login(Some("acme"), "alice", "s3cret!").await;
    let refresh = tokens["refresh_token"].as_str().unwrap();

    let response = app
        .server
        .get("/api/v1/customers")
        .add_header("Authorization", bearer(refresh))
        .await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn refresh_rotates_a_working_access_token() {
    let app = spawn_app().await;
    let (_, _) = app.seed_tenant("acme", true).await;
    let tokens = app.login(Some("acme"), "alice", "s3cret!").await;

    let response = app
        .server
        .post("/api/v1/auth/refresh")
        .json(&json!({"refresh_token": tokens["refresh_token"]}))
        .await;
    assert_eq!(response.status_code(), 200);
    let fresh = response.json::<Value>();

    let response = app
        .server
        .get("/api/v1/auth/me")
        .add_header("Authorization", bearer(fresh["access_token"].as_str().unwrap()))
        .await;
    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn deactivated_accounts_lose_access_immediately() {
    let app = spawn_app().await;
    let (tenant, admin_token) = app.seed_tenant("acme", true).await;
    let user_id = app.seed_user(tenant.id, "bob", "hunter22", false).await;
    let bob_token = app.login_token(Some("acme"), "bob", "hunter22").await;

    let response = app
        .server
        .patch(&format!("/api/v1/users/{}/active", user_id))
        .add_header("Authorization", bearer(&admin_token))
        .json(&json!({"is_active": false}))
        .await;
    assert_eq!(response.status_code(), 200);

    let response = app
        .server
        .get("/api/v1/customers")
        .add_header("Authorization", bearer(&bob_token))
        .await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn failed_logins_are_limited_per_account() {
    let app = spawn_app().await;
    let (_, _) = app.seed_tenant("acme", true).await;

    // test_config allows three failures before blocking.
    for _ in 0..3 {
        let response = app
            .server
            .post("/api/v1/auth/login")
            .json(&json!({"tenant_slug": "acme", "username": "alice", "password": "wrong"}))
            .await;
        assert_eq!(response.status_code(), 401);
    }

    // Even the right password is now refused until the window rolls over.
    let response = app
        .server
        .post("/api/v1/auth/login")
        .json(&json!({"tenant_slug": "acme", "username": "alice", "password": "s3cret!"}))
        .await;
    assert_eq!(response.status_code(), 429);

    // A different account is unaffected.
    let response = app
        .server
        .post("/api/v1/auth/login")
        .json(&json!({"tenant_slug": "acme", "username": "nobody", "password": "x"}))
        .await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn unknown_tenant_and_unknown_user_read_the_same() {
    let app = spawn_app().await;
    let (_, _) = app.seed_tenant("acme", true).await;

    let bad_tenant = app
        .server
        .post("/api/v1/auth/login")
        .json(&json!({"tenant_slug": "nope", "username": "alice", "password": "s3cret!"}))
        .await;
    let bad_user = app
        .server
        .post("/api/v1/auth/login")
        .json(&json!({"tenant_slug": "acme", "username": "nobody", "password": "s3cret!"}))
        .await;

    assert_eq!(bad_tenant.status_code(), 401);
    assert_eq!(bad_user.status_code(), 401);
    assert_eq!(
        bad_tenant.json::<Value>()["error"],
        bad_user.json::<Value>()["error"]
    );
}

#[tokio::test]
async fn admitted_requests_leave_an_audit_record() {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(capture.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let app = spawn_app().await;
    let (_, token) = app.seed_tenant("acme", true).await;

    let response = app
        .server
        .get("/api/v1/customers")
        .add_header("Authorization", bearer(&token))
        .await;
    assert_eq!(response.status_code(), 200);

    let logs = capture.contents();
    assert!(logs.contains("request completed"), "logs were: {}", logs);
    assert!(logs.contains("/api/v1/customers"));
    assert!(logs.contains("elapsed_ms"));
    assert!(logs.contains("status=200"));
}

#[tokio::test]
async fn platform_admin_binds_a_tenant_via_header() {
    let app = spawn_app().await;
    app.seed_platform_admin("root", "sup3ruser").await;
    let (tenant, _) = app.seed_tenant("acme", true).await;
    let admin_token = app.login_token(None, "root", "sup3ruser").await;

    // Without a bound tenant, tenant-partitioned routes answer 400: the
    // admin is admitted but must name the tenant to act on.
    let response = app
        .server
        .get("/api/v1/customers")
        .add_header("Authorization", bearer(&admin_token))
        .await;
    assert_eq!(response.status_code(), 400);
    assert_eq!(response.json::<Value>()["code"], "TENANT_REQUIRED");

    // Platform-level routes stay reachable unbound.
    let response = app
        .server
        .get("/api/v1/tenants")
        .add_header("Authorization", bearer(&admin_token))
        .await;
    assert_eq!(response.status_code(), 200);

    // Bound to the tenant, the same call works.
    let response = app
        .server
        .get("/api/v1/customers")
        .add_header("Authorization", bearer(&admin_token))
        .add_header("X-Tenant-Id", tenant.id.to_string())
        .await;
    assert_eq!(response.status_code(), 200);
}
