//! HTTP rate limiting: per-tenant budgets with standard headers.

mod helpers;

use helpers::{bearer, spawn_app_with, test_config};

#[tokio::test]
async fn tenant_budget_is_enforced_with_headers() {
    let mut config = test_config();
    config.http_rate_limit_per_minute = 1000;
    config.http_tenant_rate_limit_per_minute = Some(3);
    let app = spawn_app_with(config).await;
    let (_, token) = app.seed_tenant("acme", true).await;

    for expected_remaining in [2, 1, 0] {
        let response = app
            .server
            .get("/api/v1/customers")
            .add_header("Authorization", bearer(&token))
            .await;
        assert_eq!(response.status_code(), 200);
        assert_eq!(
            response.headers().get("x-ratelimit-remaining").unwrap(),
            expected_remaining.to_string().as_str()
        );
    }

    let response = app
        .server
        .get("/api/v1/customers")
        .add_header("Authorization", bearer(&token))
        .await;
    assert_eq!(response.status_code(), 429);
    assert!(response.headers().get("retry-after").is_some());
}

#[tokio::test]
async fn tenants_do_not_share_a_budget() {
    let mut config = test_config();
    config.http_rate_limit_per_minute = 1000;
    config.http_tenant_rate_limit_per_minute = Some(2);
    let app = spawn_app_with(config).await;
    let (_, token_a) = app.seed_tenant("acme", true).await;
    let (_, token_b) = app.seed_tenant("globex", true).await;

    for _ in 0..2 {
        let response = app
            .server
            .get("/api/v1/customers")
            .add_header("Authorization", bearer(&token_a))
            .await;
        assert_eq!(response.status_code(), 200);
    }
    let response = app
        .server
        .get("/api/v1/customers")
        .add_header("Authorization", bearer(&token_a))
        .await;
    assert_eq!(response.status_code(), 429);

    // Tenant B still has its full budget.
    let response = app
        .server
        .get("/api/v1/customers")
        .add_header("Authorization", bearer(&token_b))
        .await;
    assert_eq!(response.status_code(), 200);
}
