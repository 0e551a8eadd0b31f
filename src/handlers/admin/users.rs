use axum::{
    extract::Path,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config;
use crate::database::models::{AssignedRole, User};
use crate::database::store::NewUser;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub client_id: Option<i64>,
    /// Legacy role column. New accounts normally leave this unset and get
    /// role rows instead.
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
}

/// POST /api/admin/users - provision an account.
pub async fn create_user(
    Extension(state): Extension<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<User> {
    let email = payload.email.trim().to_lowercase();
    if !email.contains('@') || email.len() > 255 {
        return Err(ApiError::bad_request("A valid email address is required"));
    }
    if payload.password.len() < 8 {
        return Err(ApiError::bad_request(
            "Password must be at least 8 characters",
        ));
    }
    let display_name = payload.display_name.trim();
    if display_name.is_empty() {
        return Err(ApiError::bad_request("Display name is required"));
    }

    let password_hash = bcrypt::hash(&payload.password, config::config().security.bcrypt_cost)
        .map_err(|e| {
            tracing::error!(error = %e, "Password hashing failed");
            ApiError::internal_server_error("An internal error occurred")
        })?;

    let user = state
        .store
        .insert_user(NewUser {
            email: &email,
            password_hash: &password_hash,
            display_name,
            role: payload.role.as_deref(),
            client_id: payload.client_id,
        })
        .await?;
    tracing::info!(user_id = %user.id, "User created");
    Ok(ApiResponse::created(user))
}

/// GET /api/admin/users - all accounts, without password hashes.
pub async fn list_users(Extension(state): Extension<AppState>) -> ApiResult<Vec<User>> {
    Ok(ApiResponse::success(state.store.list_users().await?))
}

/// GET /api/admin/users/:user_id/roles - roles assigned to one account.
pub async fn user_roles(
    Extension(state): Extension<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Vec<AssignedRole>> {
    state
        .store
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(ApiResponse::success(
        state.assignments.roles_for_user(user_id).await?,
    ))
}

/// POST /api/admin/users/:user_id/roles/:role_id - assign a role.
///
/// Idempotent: assigning a role the user already holds reports
/// `created: false` with a 200 instead of an error.
pub async fn assign_role(
    Extension(state): Extension<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path((user_id, role_id)): Path<(Uuid, i64)>,
) -> ApiResult<Value> {
    let outcome = state
        .assignments
        .assign_role(user_id, role_id, Some(actor.id))
        .await?;

    let body = json!({ "assigned": true, "created": outcome.created });
    if outcome.created {
        tracing::info!(user_id = %user_id, role_id, assigned_by = %actor.id, "Role assigned");
        Ok(ApiResponse::created(body))
    } else {
        Ok(ApiResponse::success(body))
    }
}

/// DELETE /api/admin/users/:user_id/roles/:role_id - revoke a role.
///
/// Idempotent: revoking an assignment that does not exist reports
/// `removed: false`.
pub async fn revoke_role(
    Extension(state): Extension<AppState>,
    Path((user_id, role_id)): Path<(Uuid, i64)>,
) -> ApiResult<Value> {
    let removed = state.assignments.remove_role(user_id, role_id).await?;
    if removed {
        tracing::info!(user_id = %user_id, role_id, "Role revoked");
    }
    Ok(ApiResponse::success(json!({ "removed": removed })))
}

/// POST /api/admin/projects/:project_id/members - bind a user to a project.
pub async fn add_project_member(
    Extension(state): Extension<AppState>,
    Path(project_id): Path<i64>,
    Json(payload): Json<AddMemberRequest>,
) -> ApiResult<Value> {
    let created = state
        .store
        .insert_membership(payload.user_id, project_id)
        .await?;
    if created {
        tracing::info!(user_id = %payload.user_id, project_id, "Project membership added");
    }
    Ok(ApiResponse::success(json!({ "created": created })))
}
