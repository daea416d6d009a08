//! Authorization endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;

use idmesh_domain::EvaluationRequest;
use idmesh_server::authz::{correlation_id_from_header, AuditContext, CORRELATION_ID_HEADER};
use idmesh_storage::RecordStore;

use super::auth::require_claims;
use super::state::AppState;
use crate::errors::ApiError;

type ApiResult<T> = Result<T, ApiError>;

fn audit_context(headers: &HeaderMap, sub: String) -> AuditContext {
    let correlation_id = correlation_id_from_header(
        headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|value| value.to_str().ok()),
    );
    AuditContext::new(correlation_id, Some(sub))
}

/// POST /authz/evaluate
pub async fn evaluate<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(body): Json<EvaluationRequest>,
) -> ApiResult<impl IntoResponse> {
    let claims = require_claims(&state, &headers)?;
    let audit = audit_context(&headers, claims.sub);
    let decision = state.authz.evaluate(&body, &audit);
    Ok(Json(decision))
}

/// POST /authz/policies/reload
///
/// Guarded by the rule engine itself: the bearer's claims form the subject
/// and the decision must be Permit.
pub async fn reload<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let claims = require_claims(&state, &headers)?;
    let audit = audit_context(&headers, claims.sub.clone());

    if !state.authz.may_reload(&claims, &audit) {
        return Err(ApiError::forbidden("policy reload requires admin access"));
    }

    let policies = state.authz.reload().await?;
    Ok(Json(serde_json::json!({
        "status": "reloaded",
        "policies": policies,
    })))
}
