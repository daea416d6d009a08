//! Token endpoints and bearer extraction.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;

use idmesh_server::{Claims, TokenRequest};
use idmesh_storage::RecordStore;

use super::state::AppState;
use crate::errors::ApiError;

type ApiResult<T> = Result<T, ApiError>;

/// Extracts the bearer token from the Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Validates the bearer on a protected endpoint, or fails with 401.
pub fn require_claims<S: RecordStore>(
    state: &AppState<S>,
    headers: &HeaderMap,
) -> ApiResult<Claims> {
    let token = bearer_token(headers).ok_or_else(|| {
        ApiError::unauthorized("missing_bearer", "missing or malformed Authorization header")
    })?;
    Ok(state.tokens.validate(token)?)
}

/// POST /auth/token
pub async fn issue_token<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(body): Json<TokenRequest>,
) -> ApiResult<impl IntoResponse> {
    let response = state.tokens.issue(&body).await?;
    Ok(Json(response))
}

/// GET /auth/me
pub async fn me<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let claims = require_claims(&state, &headers)?;
    Ok(Json(claims))
}
