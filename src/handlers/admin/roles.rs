use axum::{
    extract::Path,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::models::Role;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetGrantRequest {
    pub granted: bool,
}

/// GET /api/admin/roles - full role catalog.
pub async fn list_roles(Extension(state): Extension<AppState>) -> ApiResult<Vec<Role>> {
    Ok(ApiResponse::success(state.catalog.all_roles().await?))
}

/// POST /api/admin/roles - create a custom role.
pub async fn create_role(
    Extension(state): Extension<AppState>,
    Json(payload): Json<CreateRoleRequest>,
) -> ApiResult<Role> {
    let name = payload.name.trim();
    if !is_identifier(name) {
        return Err(ApiError::bad_request(
            "Role name must be lowercase letters, digits and underscores (max 64 chars)",
        ));
    }

    let role = state
        .catalog
        .create_role(name, payload.description.as_deref())
        .await?;
    tracing::info!(role = %role.name, "Role created");
    Ok(ApiResponse::created(role))
}

/// DELETE /api/admin/roles/:role_id - delete a custom role.
///
/// System roles refuse deletion; assignments and grant edges of a deleted
/// role go with it.
pub async fn delete_role(
    Extension(state): Extension<AppState>,
    Path(role_id): Path<i64>,
) -> ApiResult<Value> {
    state.catalog.delete_role(role_id).await?;
    tracing::info!(role_id, "Role deleted");
    Ok(ApiResponse::success(json!({ "deleted": true })))
}

/// GET /api/admin/roles/:role_id/permissions - grants grouped by category.
pub async fn role_grants(
    Extension(state): Extension<AppState>,
    Path(role_id): Path<i64>,
) -> ApiResult<Value> {
    let role = state
        .store
        .role_by_id(role_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Role not found"))?;

    let permissions = state.catalog.role_permissions(role_id).await?;
    Ok(ApiResponse::success(json!({
        "role": role,
        "permissions": permissions,
    })))
}

/// PUT /api/admin/roles/:role_id/permissions/:permission_id - set one grant
/// edge. `granted: false` is an explicit deny and reads the same as no row.
pub async fn set_role_grant(
    Extension(state): Extension<AppState>,
    Path((role_id, permission_id)): Path<(i64, i64)>,
    Json(payload): Json<SetGrantRequest>,
) -> ApiResult<Value> {
    state
        .catalog
        .set_grant(role_id, permission_id, payload.granted)
        .await?;
    tracing::info!(role_id, permission_id, granted = payload.granted, "Grant updated");
    Ok(ApiResponse::success(json!({
        "role_id": role_id,
        "permission_id": permission_id,
        "granted": payload.granted,
    })))
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
