use axum::{
    extract::Path,
    Extension, Json,
};
use serde::Deserialize;

use crate::database::models::{Client, Project};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateClientRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
}

/// GET /api/admin/clients - all client accounts.
pub async fn list_clients(Extension(state): Extension<AppState>) -> ApiResult<Vec<Client>> {
    Ok(ApiResponse::success(state.store.list_clients().await?))
}

/// POST /api/admin/clients - onboard a client.
pub async fn create_client(
    Extension(state): Extension<AppState>,
    Json(payload): Json<CreateClientRequest>,
) -> ApiResult<Client> {
    let name = payload.name.trim();
    if name.is_empty() || name.len() > 128 {
        return Err(ApiError::bad_request("Client name is required"));
    }

    let client = state.store.insert_client(name).await?;
    tracing::info!(client_id = client.id, "Client created");
    Ok(ApiResponse::created(client))
}

/// GET /api/admin/clients/:client_id/projects - projects under one client.
pub async fn list_projects(
    Extension(state): Extension<AppState>,
    Path(client_id): Path<i64>,
) -> ApiResult<Vec<Project>> {
    state
        .store
        .client_by_id(client_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Client not found"))?;

    Ok(ApiResponse::success(
        state.store.list_projects(client_id).await?,
    ))
}

/// POST /api/admin/clients/:client_id/projects - open a project under a
/// client.
pub async fn create_project(
    Extension(state): Extension<AppState>,
    Path(client_id): Path<i64>,
    Json(payload): Json<CreateProjectRequest>,
) -> ApiResult<Project> {
    let name = payload.name.trim();
    if name.is_empty() || name.len() > 128 {
        return Err(ApiError::bad_request("Project name is required"));
    }

    let project = state.store.insert_project(client_id, name).await?;
    tracing::info!(client_id, project_id = project.id, "Project created");
    Ok(ApiResponse::created(project))
}
