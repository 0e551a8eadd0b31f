use axum::{Extension, Json};
use serde::Deserialize;

use crate::database::models::Permission;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePermissionRequest {
    pub name: String,
    pub category: String,
    pub description: Option<String>,
}

/// GET /api/admin/permissions - full permission catalog.
pub async fn list_permissions(Extension(state): Extension<AppState>) -> ApiResult<Vec<Permission>> {
    Ok(ApiResponse::success(state.catalog.all_permissions().await?))
}

/// POST /api/admin/permissions - register a permission outside the seed
/// list. The super-admin role picks it up immediately.
pub async fn create_permission(
    Extension(state): Extension<AppState>,
    Json(payload): Json<CreatePermissionRequest>,
) -> ApiResult<Permission> {
    let name = payload.name.trim();
    let category = payload.category.trim();
    if name.is_empty() || name.len() > 128 || name.contains(char::is_whitespace) {
        return Err(ApiError::bad_request(
            "Permission name must be a dotted identifier (max 128 chars)",
        ));
    }
    if category.is_empty() || category.len() > 64 {
        return Err(ApiError::bad_request("Permission category is required"));
    }

    let permission = state
        .catalog
        .create_permission(name, category, payload.description.as_deref())
        .await?;
    tracing::info!(permission = %permission.name, "Permission created");
    Ok(ApiResponse::created(permission))
}
