use std::collections::HashMap;

use axum::{
    extract::{Path, Request},
    middleware::Next,
    response::Response,
};

use crate::catalog::ADMINISTRATIVE_ROLES;
use crate::database::models::ScopedResource;
use crate::error::ApiError;
use crate::middleware::audit::emit_denial;
use crate::middleware::auth::AuthUser;
use crate::middleware::guards::authorized;
use crate::state::AppState;

/// Tenant scope proven for this request, injected as an extension once
/// [`validate_scope`] has passed. Handlers must take scope from here, never
/// from the request body.
#[derive(Clone, Copy, Debug)]
pub struct ValidatedScope {
    pub client_id: i64,
    pub project_id: i64,
}

/// A fetched row that does not belong to the validated scope.
///
/// This can only happen when a domain query forgot its scope predicate, so
/// it converts to a generic 500 rather than a 403.
#[derive(Debug)]
pub struct ScopeViolation {
    pub expected_client_id: i64,
    pub expected_project_id: i64,
    pub actual_client_id: Option<i64>,
    pub actual_project_id: Option<i64>,
}

/// Last line of defense after fetching a scoped row: verify the row really
/// carries the client and project the request was validated for.
pub fn assert_row_in_scope(
    row: &ScopedResource,
    scope: &ValidatedScope,
) -> Result<(), ScopeViolation> {
    if row.client_id == Some(scope.client_id) && row.project_id == Some(scope.project_id) {
        Ok(())
    } else {
        Err(ScopeViolation {
            expected_client_id: scope.client_id,
            expected_project_id: scope.project_id,
            actual_client_id: row.client_id,
            actual_project_id: row.project_id,
        })
    }
}

/// Tenant scope validation for `/api/clients/:client_id/projects/:project_id/...`.
///
/// Four checks, in order: the path ids are well-formed, the project exists,
/// the project belongs to the client, and a non-administrative caller is
/// bound to the client through their own `client_id` or a project
/// membership. Administrative callers (role table only) skip the last check.
pub async fn validate_scope(
    Path(params): Path<HashMap<String, String>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let state = request
        .extensions()
        .get::<AppState>()
        .cloned()
        .ok_or_else(|| ApiError::internal_server_error("Application state is not configured"))?;
    let actor = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let client_id = parse_positive_id(&params, "client_id")?;
    let project_id = parse_positive_id(&params, "project_id")?;

    let project = authorized(state.store.project_by_id(project_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;

    if project.client_id != client_id {
        emit_denial(
            &state.store,
            Some(actor.id),
            request.uri().path(),
            "project does not belong to client",
        );
        return Err(ApiError::forbidden(
            "Project does not belong to the specified client",
        ));
    }

    let user = authorized(state.store.find_user_by_id(actor.id))
        .await?
        .filter(|u| u.active)
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let effective = authorized(state.assignments.resolve_effective_roles(&user)).await?;
    let administrative = effective
        .iter()
        .any(|role| ADMINISTRATIVE_ROLES.contains(&role.as_str()));

    if !administrative {
        let bound = user.client_id == Some(client_id)
            || authorized(state.store.user_is_member(user.id, project_id)).await?;
        if !bound {
            emit_denial(
                &state.store,
                Some(actor.id),
                request.uri().path(),
                "caller not bound to client",
            );
            return Err(ApiError::forbidden("Access to this client is not permitted"));
        }
    }

    request.extensions_mut().insert(ValidatedScope {
        client_id,
        project_id,
    });
    Ok(next.run(request).await)
}

fn parse_positive_id(params: &HashMap<String, String>, key: &str) -> Result<i64, ApiError> {
    params
        .get(key)
        .and_then(|raw| raw.parse::<i64>().ok())
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::bad_request("Invalid client or project identifier"))
}
