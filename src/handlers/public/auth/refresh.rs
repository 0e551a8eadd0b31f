use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;

use super::utils::{issue_session, TokenResponse};
use crate::auth::{token_digest, verify_token, TokenKind};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// POST /auth/refresh - rotate a refresh token into a new session.
///
/// The old session row is revoked before the new pair is issued, so a
/// refresh token can be redeemed exactly once.
pub async fn refresh(
    Extension(state): Extension<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<TokenResponse> {
    let claims = verify_token(&payload.refresh_token, TokenKind::Refresh).map_err(|e| {
        tracing::debug!(error = %e, "Refresh rejected: token failed verification");
        ApiError::unauthorized("Invalid or expired refresh token")
    })?;

    let session = state
        .store
        .find_session_by_digest(&token_digest(&payload.refresh_token))
        .await?
        .filter(|s| s.is_usable(Utc::now()))
        .ok_or_else(|| {
            tracing::debug!(user_id = %claims.sub, "Refresh rejected: session revoked or expired");
            ApiError::unauthorized("Invalid or expired refresh token")
        })?;

    let user = state
        .store
        .find_user_by_id(session.user_id)
        .await?
        .filter(|u| u.active)
        .ok_or_else(|| {
            tracing::debug!(user_id = %session.user_id, "Refresh rejected: account missing or inactive");
            ApiError::unauthorized("Invalid or expired refresh token")
        })?;

    state.store.revoke_session(session.id).await?;

    let response = issue_session(&state, &user).await?;
    tracing::info!(user_id = %user.id, "Session refreshed");
    Ok(ApiResponse::success(response))
}
