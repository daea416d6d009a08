//! HTTP route definitions.

use std::sync::Arc;

use axum::{
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use tower_http::limit::RequestBodyLimitLayer;

use idmesh_storage::RecordStore;

use super::state::AppState;
use super::{auth, authz, scim_groups, scim_users};
use crate::middleware::CorrelationIdLayer;

/// Default request body size limit (1MB).
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Creates the HTTP router with all endpoints and the default body limit.
pub fn create_router<S: RecordStore>(state: AppState<S>) -> Router {
    create_router_with_body_limit(state, DEFAULT_BODY_LIMIT)
}

/// Creates the HTTP router with a custom body size limit.
pub fn create_router_with_body_limit<S: RecordStore>(
    state: AppState<S>,
    body_limit: usize,
) -> Router {
    let shared_state = Arc::new(state);
    Router::new()
        // Token endpoints
        .route("/auth/token", post(auth::issue_token::<S>))
        .route("/auth/me", get(auth::me::<S>))
        // SCIM provisioning
        .route(
            "/scim/v2/Users",
            post(scim_users::create::<S>).get(scim_users::list::<S>),
        )
        .route(
            "/scim/v2/Users/:user_id",
            get(scim_users::get_one::<S>)
                .patch(scim_users::patch::<S>)
                .delete(scim_users::delete_one::<S>),
        )
        .route(
            "/scim/v2/Groups",
            post(scim_groups::create::<S>).get(scim_groups::list::<S>),
        )
        .route(
            "/scim/v2/Groups/:group_id",
            get(scim_groups::get_one::<S>)
                .patch(scim_groups::patch::<S>)
                .delete(scim_groups::delete_one::<S>),
        )
        .route(
            "/scim/v2/Groups/:group_id/members",
            post(scim_groups::add_member::<S>),
        )
        .route(
            "/scim/v2/Groups/:group_id/members/:user_id",
            delete(scim_groups::remove_member::<S>),
        )
        // Authorization
        .route("/authz/evaluate", post(authz::evaluate::<S>))
        .route("/authz/policies/reload", post(authz::reload::<S>))
        // Liveness
        .route("/auth/health", get(health_check))
        .route("/authz/health", get(health_check))
        .with_state(shared_state)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(CorrelationIdLayer::new())
}

/// Basic liveness probe; does not check dependencies.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
