use axum::Extension;
use serde::Serialize;
use uuid::Uuid;

use crate::database::models::AssignedRole;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WhoamiResponse {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub client_id: Option<i64>,
    /// Legacy role column, kept for display until the migration finishes.
    pub legacy_role: Option<String>,
    pub roles: Vec<AssignedRole>,
    pub is_super_admin: bool,
}

/// GET /api/auth/whoami - live view of the caller's account and roles.
///
/// Everything here is re-read from the store; the token snapshot is not
/// echoed back, so a role change shows up on the next call.
pub async fn whoami(
    Extension(state): Extension<AppState>,
    Extension(actor): Extension<AuthUser>,
) -> ApiResult<WhoamiResponse> {
    let user = state
        .store
        .find_user_by_id(actor.id)
        .await?
        .filter(|u| u.active)
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let roles = state.assignments.roles_for_user(user.id).await?;
    let is_super_admin = state.assignments.is_super_admin(user.id).await?;

    Ok(ApiResponse::success(WhoamiResponse {
        id: user.id,
        email: user.email,
        display_name: user.display_name,
        client_id: user.client_id,
        legacy_role: user.role,
        roles,
        is_super_admin,
    }))
}
