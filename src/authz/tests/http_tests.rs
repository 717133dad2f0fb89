//! Access API tests driven through the router with `tower::ServiceExt`

mod common;

use authone_authz::http::{create_metrics_router, create_router, AppState};
use authone_authz::AuthzConfig;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn state() -> Arc<AppState> {
    let config = AuthzConfig {
        resource_paths: common::resource_paths(),
        ..Default::default()
    };
    let repo = Arc::new(common::entities().await);
    Arc::new(AppState::from_config(&config, repo))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, value)
}

async fn check(app: &Router, account: &str, tenant: &str, action: &str) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/v1/check",
        Some(json!({
            "account_id": account,
            "tenant_id": tenant,
            "resource": "/docs/1",
            "action": action,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

// ============================================================================
// BINDINGS AND CHECKS
// ============================================================================

#[tokio::test]
async fn test_bind_then_check() {
    let app = create_router(state().await);

    let (status, _) = send(&app, Method::POST, "/v1/roles/reader/permissions/p-read", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::POST, "/v1/accounts/alice/roles/reader", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let body = check(&app, "alice", "t1", "read").await;
    assert_eq!(body["allowed"], true);
    assert_eq!(body["granted_by"], "reader");
    assert_eq!(body["reason"], "granted by role reader");

    let body = check(&app, "alice", "t1", "write").await;
    assert_eq!(body["allowed"], false);
    assert_eq!(body["reason"], "permission doc:write not granted");
}

#[tokio::test]
async fn test_group_routes() {
    let app = create_router(state().await);

    send(&app, Method::POST, "/v1/roles/editor/permissions/p-write", None).await;
    let (status, _) = send(&app, Method::POST, "/v1/groups/dev-team/roles/editor", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::POST, "/v1/accounts/carol/groups/dev-team", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(check(&app, "carol", "t1", "write").await["allowed"], true);

    let (status, _) = send(&app, Method::DELETE, "/v1/accounts/carol/groups/dev-team", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(check(&app, "carol", "t1", "write").await["allowed"], false);
}

#[tokio::test]
async fn test_unbind_is_idempotent_over_http() {
    let app = create_router(state().await);

    for _ in 0..2 {
        let (status, _) = send(&app, Method::DELETE, "/v1/accounts/alice/roles/reader", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

#[tokio::test]
async fn test_unknown_entity_is_404() {
    let app = create_router(state().await);

    let (status, body) = send(&app, Method::POST, "/v1/accounts/alice/roles/ghost", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
    assert_eq!(body["error"], "role not found: ghost");
}

#[tokio::test]
async fn test_empty_action_is_400() {
    let app = create_router(state().await);

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/check",
        Some(json!({"account_id": "alice", "tenant_id": "t1", "resource": "/docs/1", "action": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_malformed_check_body_is_400() {
    let app = create_router(state().await);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/check")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"account_id": "alice", "resource": 7"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], 400);
    assert!(body["error"].as_str().unwrap().starts_with("Bad request"));
}

#[tokio::test]
async fn test_missing_tenant_denies() {
    let app = create_router(state().await);

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/check",
        Some(json!({"account_id": "alice", "resource": "/docs/1", "action": "read"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], false);
    assert_eq!(body["reason"], "no tenant");
}

// ============================================================================
// REBUILD, HEALTH, METRICS
// ============================================================================

#[tokio::test]
async fn test_rebuild_and_health() {
    let state = state().await;
    let app = create_router(state.clone());

    let (status, stats) = send(&app, Method::POST, "/v1/rebuild", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["accounts"], 4);
    assert_eq!(stats["version"], 1);

    let (status, health) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["rule_version"], 1);
}

#[tokio::test]
async fn test_metrics_exposition() {
    let state = state().await;
    let app = create_router(state.clone());
    let metrics_app = create_metrics_router(state);

    check(&app, "alice", "t1", "read").await;

    let (status, body) = send(&metrics_app, Method::GET, "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().unwrap();
    assert!(text.contains("authz_checks_total 1"));
    assert!(text.contains("authz_rule_version 0"));
}
