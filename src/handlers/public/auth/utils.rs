use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{generate_token, token_digest, Claims, TokenKind};
use crate::config;
use crate::database::models::{Session, User};
use crate::error::ApiError;
use crate::state::AppState;

/// User block included in token responses.
#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub client_id: Option<i64>,
    pub roles: Vec<String>,
}

/// Body shared by login and refresh responses.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: UserInfo,
}

/// Mint an access/refresh pair for `user` and persist the session row.
///
/// The effective roles are resolved once and snapshotted into both tokens
/// and the session record. Guards never trust the snapshot; it exists for
/// display and for forensics on old sessions.
pub async fn issue_session(state: &AppState, user: &User) -> Result<TokenResponse, ApiError> {
    let roles = state.assignments.resolve_effective_roles(user).await?;

    let access_token = generate_token(&Claims::new(user, roles.clone(), TokenKind::Access))?;
    let refresh_token = generate_token(&Claims::new(user, roles.clone(), TokenKind::Refresh))?;

    let security = &config::config().security;
    let now = Utc::now();
    let session = Session {
        id: Uuid::new_v4(),
        user_id: user.id,
        refresh_digest: token_digest(&refresh_token),
        roles_snapshot: json!(roles),
        issued_at: now,
        expires_at: now + Duration::days(security.refresh_token_days),
        revoked_at: None,
    };
    state.store.insert_session(&session).await?;

    Ok(TokenResponse {
        access_token,
        refresh_token,
        token_type: "Bearer",
        expires_in: security.access_token_minutes * 60,
        user: UserInfo {
            id: user.id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            client_id: user.client_id,
            roles,
        },
    })
}
