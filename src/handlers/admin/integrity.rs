use axum::{Extension, Json};
use serde::Deserialize;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, SuperAdminContext};
use crate::services::{IntegrityReport, IsolationReport};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IsolationTestRequest {
    pub client_id: i64,
    pub project_id: i64,
}

/// GET /api/admin/integrity - run the full integrity audit.
///
/// Always returns 200; the severity lives in the report's `status` field
/// so monitoring can alert on WARNING/CRITICAL without special-casing
/// HTTP codes.
pub async fn integrity_report(
    Extension(state): Extension<AppState>,
) -> ApiResult<IntegrityReport> {
    Ok(ApiResponse::success(state.integrity.run_audit().await))
}

/// POST /api/admin/integrity/isolation-test - live isolation probe.
///
/// Writes one throwaway row into the given scope and verifies it cannot
/// be seen from neighboring scopes. Super admin only; the probe row is
/// attributed to the caller.
pub async fn isolation_test(
    Extension(state): Extension<AppState>,
    Extension(ctx): Extension<SuperAdminContext>,
    Json(payload): Json<IsolationTestRequest>,
) -> ApiResult<IsolationReport> {
    let project = state
        .store
        .project_by_id(payload.project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;
    if project.client_id != payload.client_id {
        return Err(ApiError::bad_request(
            "Project does not belong to the specified client",
        ));
    }

    tracing::info!(
        actor = %ctx.user_id,
        email = %ctx.email,
        verified_at = %ctx.verified_at,
        client_id = payload.client_id,
        project_id = payload.project_id,
        "Isolation probe requested"
    );

    let report = state
        .integrity
        .test_data_isolation(payload.client_id, payload.project_id, ctx.user_id)
        .await;
    Ok(ApiResponse::success(report))
}
