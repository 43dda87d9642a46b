//! The permission matrix over HTTP: platform admins, tenant admins, role
//! holders, and everyone else.

mod helpers;

use helpers::{bearer, spawn_app};
use serde_json::{json, Value};

#[tokio::test]
async fn plain_users_need_a_granting_role() {
    let app = spawn_app().await;
    let (tenant, admin_token) = app.seed_tenant("acme", true).await;
    app.seed_user(tenant.id, "bob", "hunter22", false).await;
    let bob_token = app.login_token(Some("acme"), "bob", "hunter22").await;

    // Bob holds no roles: writes are refused, 403 not 404.
    let response = app
        .server
        .post("/api/v1/customers")
        .add_header("Authorization", bearer(&bob_token))
        .json(&json!({"name": "Nope"}))
        .await;
    assert_eq!(response.status_code(), 403);
    assert_eq!(response.json::<Value>()["code"], "NOT_AUTHORIZED");

    // The admin publishes the permission and a granting role.
    let response = app
        .server
        .post("/api/v1/permissions")
        .add_header("Authorization", bearer(&admin_token))
        .json(&json!({"code": "customers.manage", "description": "Manage customers"}))
        .await;
    assert_eq!(response.status_code(), 201);

    let response = app
        .server
        .post("/api/v1/roles")
        .add_header("Authorization", bearer(&admin_token))
        .json(&json!({"name": "clerk", "permission_codes": ["customers.manage"]}))
        .await;
    assert_eq!(response.status_code(), 201);
    let role_id = response.json::<Value>()["id"].as_str().unwrap().to_string();

    let bob_id = app
        .state
        .actors
        .find_tenant_user(tenant.id, "bob")
        .await
        .unwrap()
        .unwrap()
        .id;
    let response = app
        .server
        .put(&format!("/api/v1/users/{}/roles", bob_id))
        .add_header("Authorization", bearer(&admin_token))
        .json(&json!({"role_ids": [role_id]}))
        .await;
    assert_eq!(response.status_code(), 200);

    // Roles are read at evaluation time, so the old token now passes.
    let response = app
        .server
        .post("/api/v1/customers")
        .add_header("Authorization", bearer(&bob_token))
        .json(&json!({"name": "Finally"}))
        .await;
    assert_eq!(response.status_code(), 201);
}

#[tokio::test]
async fn deactivating_a_role_withdraws_its_grants() {
    let app = spawn_app().await;
    let (tenant, admin_token) = app.seed_tenant("acme", true).await;
    let bob_id = app.seed_user(tenant.id, "bob", "hunter22", false).await;
    let bob_token = app.login_token(Some("acme"), "bob", "hunter22").await;

    app.server
        .post("/api/v1/permissions")
        .add_header("Authorization", bearer(&admin_token))
        .json(&json!({"code": "customers.manage", "description": ""}))
        .await;
    let role = app
        .server
        .post("/api/v1/roles")
        .add_header("Authorization", bearer(&admin_token))
        .json(&json!({"name": "clerk", "permission_codes": ["customers.manage"]}))
        .await
        .json::<Value>();
    let role_id = role["id"].as_str().unwrap().to_string();

    app.server
        .put(&format!("/api/v1/users/{}/roles", bob_id))
        .add_header("Authorization", bearer(&admin_token))
        .json(&json!({"role_ids": [role_id]}))
        .await;

    let response = app
        .server
        .post("/api/v1/customers")
        .add_header("Authorization", bearer(&bob_token))
        .json(&json!({"name": "Works"}))
        .await;
    assert_eq!(response.status_code(), 201);

    let response = app
        .server
        .patch(&format!("/api/v1/roles/{}/active", role_id))
        .add_header("Authorization", bearer(&admin_token))
        .json(&json!({"is_active": false}))
        .await;
    assert_eq!(response.status_code(), 200);

    let response = app
        .server
        .post("/api/v1/customers")
        .add_header("Authorization", bearer(&bob_token))
        .json(&json!({"name": "Refused"}))
        .await;
    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn tenant_admin_endpoints_refuse_plain_users() {
    let app = spawn_app().await;
    let (tenant, _) = app.seed_tenant("acme", true).await;
    app.seed_user(tenant.id, "bob", "hunter22", false).await;
    let bob_token = app.login_token(Some("acme"), "bob", "hunter22").await;

    let response = app
        .server
        .post("/api/v1/users")
        .add_header("Authorization", bearer(&bob_token))
        .json(&json!({"username": "eve", "password": "p4ssw0rd"}))
        .await;
    assert_eq!(response.status_code(), 403);

    let response = app
        .server
        .post("/api/v1/roles")
        .add_header("Authorization", bearer(&bob_token))
        .json(&json!({"name": "sneaky", "permission_codes": []}))
        .await;
    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn platform_endpoints_refuse_tenant_admins() {
    let app = spawn_app().await;
    let (_, admin_token) = app.seed_tenant("acme", true).await;

    let response = app
        .server
        .post("/api/v1/tenants")
        .add_header("Authorization", bearer(&admin_token))
        .json(&json!({"slug": "rogue", "display_name": "Rogue"}))
        .await;
    assert_eq!(response.status_code(), 403);

    let response = app
        .server
        .get("/api/v1/tenants")
        .add_header("Authorization", bearer(&admin_token))
        .await;
    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn platform_admin_provisions_a_tenant_end_to_end() {
    let app = spawn_app().await;
    app.seed_platform_admin("root", "sup3ruser").await;
    let admin_token = app.login_token(None, "root", "sup3ruser").await;

    let response = app
        .server
        .post("/api/v1/tenants")
        .add_header("Authorization", bearer(&admin_token))
        .json(&json!({"slug": "newco", "display_name": "NewCo", "timezone": "Europe/Berlin"}))
        .await;
    assert_eq!(response.status_code(), 201);
    let tenant_id = response.json::<Value>()["id"].as_str().unwrap().to_string();

    let response = app
        .server
        .post(&format!("/api/v1/tenants/{}/users", tenant_id))
        .add_header("Authorization", bearer(&admin_token))
        .json(&json!({"username": "founder", "password": "p4ssw0rd", "is_tenant_admin": true}))
        .await;
    assert_eq!(response.status_code(), 201);

    // The bootstrapped admin can log in and act.
    let token = app.login_token(Some("newco"), "founder", "p4ssw0rd").await;
    let response = app
        .server
        .post("/api/v1/customers")
        .add_header("Authorization", bearer(&token))
        .json(&json!({"name": "First customer"}))
        .await;
    assert_eq!(response.status_code(), 201);
}
