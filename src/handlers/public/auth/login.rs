use axum::{Extension, Json};
use serde::Deserialize;

use super::utils::{issue_session, TokenResponse};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /auth/login - exchange credentials for an access/refresh pair.
///
/// Unknown email, wrong password and deactivated account all return the
/// same 401 so the endpoint cannot be used to enumerate users.
pub async fn login(
    Extension(state): Extension<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<TokenResponse> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let user = state
        .store
        .find_user_by_email(&email)
        .await?
        .filter(|u| u.active);

    let user = match user {
        Some(user) => user,
        None => {
            tracing::debug!(email = %email, "Login rejected: unknown or inactive account");
            return Err(ApiError::unauthorized("Invalid email or password"));
        }
    };

    let verified = bcrypt::verify(&payload.password, &user.password_hash).map_err(|e| {
        tracing::error!(error = %e, "Stored password hash could not be verified");
        ApiError::internal_server_error("An internal error occurred")
    })?;
    if !verified {
        tracing::debug!(email = %email, "Login rejected: bad password");
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    let response = issue_session(&state, &user).await?;
    tracing::info!(user_id = %user.id, "User logged in");
    Ok(ApiResponse::success(response))
}
