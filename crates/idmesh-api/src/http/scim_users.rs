//! SCIM user endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use idmesh_server::scim::users::{UserCreate, UserPatch};
use idmesh_storage::RecordStore;

use super::state::AppState;
use crate::errors::ApiError;

type ApiResult<T> = Result<T, ApiError>;

/// Query parameters for list endpoints.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub filter: Option<String>,
}

/// POST /scim/v2/Users
pub async fn create<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(body): Json<UserCreate>,
) -> ApiResult<impl IntoResponse> {
    let resource = state.users.create(body).await?;
    Ok((StatusCode::CREATED, Json(resource)))
}

/// GET /scim/v2/Users/{id}
pub async fn get_one<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let resource = state.users.get(&user_id).await?;
    Ok(Json(resource))
}

/// GET /scim/v2/Users?filter=userName eq "x"
pub async fn list<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let response = state.users.list(query.filter.as_deref()).await?;
    Ok(Json(response))
}

/// PATCH /scim/v2/Users/{id}
pub async fn patch<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
    Json(body): Json<UserPatch>,
) -> ApiResult<impl IntoResponse> {
    let resource = state.users.patch(&user_id, body).await?;
    Ok(Json(resource))
}

/// DELETE /scim/v2/Users/{id}
pub async fn delete_one<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.users.delete(&user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
