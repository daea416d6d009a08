//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt; // for oneshot

use idmesh_api::http::{create_router, AppState};
use idmesh_domain::policy::loader::DEFAULT_POLICIES_JSON;
use idmesh_domain::{PolicyLoader, PolicyStore};
use idmesh_server::seed::seed_initial_data;
use idmesh_server::{AuthzService, ServiceConfig, TokenService};
use idmesh_storage::MemoryRecordStore;

pub struct TestApp {
    pub router: axum::Router,
    pub policies_path: PathBuf,
    // keeps the policy file alive for the duration of the test
    _policies_dir: TempDir,
}

/// Builds a seeded app over the default policy document.
pub async fn test_app() -> TestApp {
    test_app_with_policies(DEFAULT_POLICIES_JSON).await
}

/// Builds a seeded app over a custom policy document.
pub async fn test_app_with_policies(policies_json: &str) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let policies_path = dir.path().join("policies.json");
    std::fs::write(&policies_path, policies_json).unwrap();

    let set = PolicyLoader::load(&policies_path).unwrap();
    let policies = Arc::new(PolicyStore::new(set));

    let storage = MemoryRecordStore::new_shared();
    seed_initial_data(storage.as_ref()).await.unwrap();

    let config = ServiceConfig {
        jwt_secret: Some("integration-test-secret".to_string()),
        ..ServiceConfig::default()
    };
    let tokens = Arc::new(TokenService::from_config(&config, Arc::clone(&storage)).unwrap());
    let authz = Arc::new(AuthzService::new(policies, policies_path.clone()));

    TestApp {
        router: create_router(AppState::new(storage, tokens, authz)),
        policies_path,
        _policies_dir: dir,
    }
}

/// Sends one request and returns (status, parsed JSON body).
/// The body value is `Value::Null` for empty responses.
pub async fn send(
    app: &TestApp,
    method: &str,
    uri: &str,
    body: Option<Value>,
    bearer: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Obtains a bearer token via the password grant.
pub async fn obtain_token(app: &TestApp, username: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/auth/token",
        Some(serde_json::json!({
            "grant_type": "password",
            "username": username,
            "password": password,
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "token request failed: {body}");
    body["access_token"].as_str().unwrap().to_string()
}
