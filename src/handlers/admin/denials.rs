use axum::{extract::Query, Extension};
use serde::Deserialize;

use crate::database::models::AccessDenialEvent;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct DenialsQuery {
    pub limit: Option<i64>,
}

/// GET /api/admin/logs/denials - most recent access denials, newest first.
pub async fn recent_denials(
    Extension(state): Extension<AppState>,
    Query(query): Query<DenialsQuery>,
) -> ApiResult<Vec<AccessDenialEvent>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    Ok(ApiResponse::success(
        state.store.recent_denials(limit).await?,
    ))
}
