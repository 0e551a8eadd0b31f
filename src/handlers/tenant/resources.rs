use std::collections::HashMap;

use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::models::ScopedResource;
use crate::database::store::NewResource;
use crate::error::ApiError;
use crate::middleware::{assert_row_in_scope, ApiResponse, ApiResult, AuthUser, ValidatedScope};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub kind: Option<String>,
}

/// Create payload. Scope is deliberately absent: any `client_id` or
/// `project_id` in the body is ignored and the validated path scope is
/// stamped on the row instead.
#[derive(Debug, Deserialize)]
pub struct CreateResourceRequest {
    pub kind: String,
    pub logical_key: String,
    #[serde(default)]
    pub payload: Value,
}

/// GET /api/clients/:client_id/projects/:project_id/resources
pub async fn list_resources(
    Extension(state): Extension<AppState>,
    Extension(scope): Extension<ValidatedScope>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<ScopedResource>> {
    let rows = state
        .store
        .list_resources(scope.client_id, scope.project_id, query.kind.as_deref())
        .await?;
    Ok(ApiResponse::success(rows))
}

/// POST /api/clients/:client_id/projects/:project_id/resources
pub async fn create_resource(
    Extension(state): Extension<AppState>,
    Extension(scope): Extension<ValidatedScope>,
    Extension(actor): Extension<AuthUser>,
    Json(payload): Json<CreateResourceRequest>,
) -> ApiResult<ScopedResource> {
    let kind = payload.kind.trim();
    let logical_key = payload.logical_key.trim();
    if kind.is_empty() || kind.len() > 64 {
        return Err(ApiError::bad_request("Resource kind is required"));
    }
    if logical_key.is_empty() || logical_key.len() > 255 {
        return Err(ApiError::bad_request("Resource logical_key is required"));
    }

    let row = state
        .store
        .insert_resource(NewResource {
            client_id: Some(scope.client_id),
            project_id: Some(scope.project_id),
            kind,
            logical_key,
            payload: payload.payload,
            created_by: Some(actor.id),
        })
        .await?;
    tracing::info!(
        resource_id = row.id,
        client_id = scope.client_id,
        project_id = scope.project_id,
        "Resource created"
    );
    Ok(ApiResponse::created(row))
}

/// GET /api/clients/:client_id/projects/:project_id/resources/:resource_id
///
/// Lookup is scoped, so an id that exists under another tenant is a plain
/// 404. The row is still run through `assert_row_in_scope` before leaving
/// the handler.
pub async fn get_resource(
    Extension(state): Extension<AppState>,
    Extension(scope): Extension<ValidatedScope>,
    Path(params): Path<HashMap<String, String>>,
) -> ApiResult<ScopedResource> {
    let resource_id = parse_resource_id(&params)?;
    let row = fetch_in_scope(&state, &scope, resource_id).await?;
    Ok(ApiResponse::success(row))
}

/// DELETE /api/clients/:client_id/projects/:project_id/resources/:resource_id
pub async fn delete_resource(
    Extension(state): Extension<AppState>,
    Extension(scope): Extension<ValidatedScope>,
    Path(params): Path<HashMap<String, String>>,
) -> ApiResult<Value> {
    let resource_id = parse_resource_id(&params)?;
    let row = fetch_in_scope(&state, &scope, resource_id).await?;
    state.store.delete_resource(row.id).await?;
    tracing::info!(resource_id = row.id, "Resource deleted");
    Ok(ApiResponse::success(json!({ "deleted": true })))
}

/// `:resource_id` is parsed by hand so a malformed id produces the same
/// response envelope as the scope middleware's 400, not the extractor's
/// plain-text rejection.
fn parse_resource_id(params: &HashMap<String, String>) -> Result<i64, ApiError> {
    params
        .get("resource_id")
        .and_then(|raw| raw.parse::<i64>().ok())
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::bad_request("Invalid resource identifier"))
}

async fn fetch_in_scope(
    state: &AppState,
    scope: &ValidatedScope,
    resource_id: i64,
) -> Result<ScopedResource, ApiError> {
    let row = state
        .store
        .resource_by_id(resource_id)
        .await?
        .filter(|r| {
            r.client_id == Some(scope.client_id) && r.project_id == Some(scope.project_id)
        })
        .ok_or_else(|| ApiError::not_found("Resource not found"))?;

    assert_row_in_scope(&row, scope)?;
    Ok(row)
}
