use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::token_digest;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

/// DELETE /api/auth/session - revoke the session behind a refresh token.
///
/// Idempotent and never an error: a token that maps to nothing, to someone
/// else's session, or to a session already revoked reports
/// `revoked: false`.
pub async fn logout(
    Extension(state): Extension<AppState>,
    Extension(actor): Extension<AuthUser>,
    Json(payload): Json<LogoutRequest>,
) -> ApiResult<Value> {
    let session = state
        .store
        .find_session_by_digest(&token_digest(&payload.refresh_token))
        .await?
        .filter(|s| s.user_id == actor.id);

    let revoked = match session {
        Some(session) => {
            let revoked = state.store.revoke_session(session.id).await?;
            if revoked {
                tracing::info!(user_id = %actor.id, session_id = %session.id, "Session revoked");
            }
            revoked
        }
        None => false,
    };

    Ok(ApiResponse::success(json!({ "revoked": revoked })))
}
