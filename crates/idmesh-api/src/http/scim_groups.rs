//! SCIM group endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use idmesh_server::scim::groups::{GroupCreate, GroupPatch, MemberPayload};
use idmesh_storage::RecordStore;

use super::scim_users::ListQuery;
use super::state::AppState;
use crate::errors::ApiError;

type ApiResult<T> = Result<T, ApiError>;

/// POST /scim/v2/Groups
pub async fn create<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(body): Json<GroupCreate>,
) -> ApiResult<impl IntoResponse> {
    let resource = state.groups.create(body).await?;
    Ok((StatusCode::CREATED, Json(resource)))
}

/// GET /scim/v2/Groups/{id}
pub async fn get_one<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(group_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let resource = state.groups.get(&group_id).await?;
    Ok(Json(resource))
}

/// GET /scim/v2/Groups?filter=displayName eq "x"
pub async fn list<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let response = state.groups.list(query.filter.as_deref()).await?;
    Ok(Json(response))
}

/// PATCH /scim/v2/Groups/{id}
pub async fn patch<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(group_id): Path<String>,
    Json(body): Json<GroupPatch>,
) -> ApiResult<impl IntoResponse> {
    let resource = state.groups.patch(&group_id, body).await?;
    Ok(Json(resource))
}

/// DELETE /scim/v2/Groups/{id}
pub async fn delete_one<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(group_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.groups.delete(&group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /scim/v2/Groups/{id}/members
pub async fn add_member<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(group_id): Path<String>,
    Json(body): Json<MemberPayload>,
) -> ApiResult<impl IntoResponse> {
    let resource = state.groups.add_member(&group_id, body).await?;
    Ok(Json(resource))
}

/// DELETE /scim/v2/Groups/{id}/members/{userId}
pub async fn remove_member<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    Path((group_id, user_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let resource = state.groups.remove_member(&group_id, &user_id).await?;
    Ok(Json(resource))
}
