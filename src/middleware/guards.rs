use std::future::Future;
use std::pin::Pin;

use axum::{extract::Request, middleware::Next, response::Response};
use chrono::{DateTime, Utc};
use tokio::time::timeout;
use uuid::Uuid;

use crate::config;
use crate::database::StoreError;
use crate::error::ApiError;
use crate::middleware::audit::emit_denial;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Verified super-admin identity, inserted after a successful role-table
/// check so downstream handlers can tell the check really ran. `role` is
/// the token snapshot and is display-only, as on [`AuthUser`].
#[derive(Clone, Debug)]
pub struct SuperAdminContext {
    pub user_id: Uuid,
    pub email: String,
    pub role: Option<String>,
    pub verified_at: DateTime<Utc>,
}

type GuardFuture = Pin<Box<dyn Future<Output = Result<Response, ApiError>> + Send>>;

/// Guard factory: the caller must hold the `super_admin` role.
///
/// Membership is decided solely by the role table; the legacy `role`
/// column and the token snapshot are never consulted.
pub fn require_super_admin() -> impl Fn(Request, Next) -> GuardFuture + Clone {
    |request, next| Box::pin(check_super_admin(request, next))
}

/// Guard factory: the caller must hold `permission` through at least one
/// assigned role.
pub fn require_permission(
    permission: &'static str,
) -> impl Fn(Request, Next) -> GuardFuture + Clone {
    move |request, next| Box::pin(check_permission(permission, request, next))
}

/// Guard factory: the caller must hold at least one of `permissions`.
pub fn require_any_permission(
    permissions: &'static [&'static str],
) -> impl Fn(Request, Next) -> GuardFuture + Clone {
    move |request, next| Box::pin(check_any_permission(permissions, request, next))
}

/// Guard factory: the caller must hold every one of `permissions`.
pub fn require_all_permissions(
    permissions: &'static [&'static str],
) -> impl Fn(Request, Next) -> GuardFuture + Clone {
    move |request, next| Box::pin(check_all_permissions(permissions, request, next))
}

/// Guard factory: super admins pass outright, everyone else must hold one
/// of the named roles in their effective set (role rows first; the legacy
/// column stands in only while the user holds no role rows).
pub fn require_super_admin_or_role_in(
    roles: &'static [&'static str],
) -> impl Fn(Request, Next) -> GuardFuture + Clone {
    move |request, next| Box::pin(check_super_admin_or_role_in(roles, request, next))
}

async fn check_super_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let (state, actor) = guard_context(&request)?;
    let allowed = authorized(state.assignments.is_super_admin(actor.id)).await?;
    if !allowed {
        emit_denial(
            &state.store,
            Some(actor.id),
            request.uri().path(),
            "super admin required",
        );
        return Err(ApiError::forbidden("Super admin access required"));
    }

    let mut request = request;
    request.extensions_mut().insert(SuperAdminContext {
        user_id: actor.id,
        email: actor.email,
        role: actor.role,
        verified_at: Utc::now(),
    });
    Ok(next.run(request).await)
}

async fn check_permission(
    permission: &'static str,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (state, actor) = guard_context(&request)?;
    let allowed = authorized(state.assignments.has_permission(actor.id, permission)).await?;
    if !allowed {
        emit_denial(
            &state.store,
            Some(actor.id),
            request.uri().path(),
            &format!("missing permission {permission}"),
        );
        return Err(ApiError::forbidden(format!(
            "Permission denied: {permission} is required"
        )));
    }
    Ok(next.run(request).await)
}

async fn check_any_permission(
    permissions: &'static [&'static str],
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (state, actor) = guard_context(&request)?;
    for permission in permissions {
        if authorized(state.assignments.has_permission(actor.id, permission)).await? {
            return Ok(next.run(request).await);
        }
    }
    emit_denial(
        &state.store,
        Some(actor.id),
        request.uri().path(),
        &format!("missing all of {}", permissions.join(", ")),
    );
    Err(ApiError::forbidden(format!(
        "Permission denied: requires one of {}",
        permissions.join(", ")
    )))
}

async fn check_all_permissions(
    permissions: &'static [&'static str],
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (state, actor) = guard_context(&request)?;
    for permission in permissions {
        if !authorized(state.assignments.has_permission(actor.id, permission)).await? {
            emit_denial(
                &state.store,
                Some(actor.id),
                request.uri().path(),
                &format!("missing permission {permission}"),
            );
            return Err(ApiError::forbidden(format!(
                "Permission denied: {permission} is required"
            )));
        }
    }
    Ok(next.run(request).await)
}

async fn check_super_admin_or_role_in(
    roles: &'static [&'static str],
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (state, actor) = guard_context(&request)?;
    let mut allowed = authorized(state.assignments.is_super_admin(actor.id)).await?;
    if !allowed {
        let user = authorized(state.store.find_user_by_id(actor.id))
            .await?
            .filter(|u| u.active)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
        let effective = authorized(state.assignments.resolve_effective_roles(&user)).await?;
        allowed = effective.iter().any(|held| roles.contains(&held.as_str()));
    }
    if !allowed {
        emit_denial(
            &state.store,
            Some(actor.id),
            request.uri().path(),
            &format!("requires super admin or one of roles {}", roles.join(", ")),
        );
        return Err(ApiError::forbidden(format!(
            "Access requires super admin or one of roles: {}",
            roles.join(", ")
        )));
    }
    Ok(next.run(request).await)
}

/// Pull the shared state and the authenticated caller off the request.
fn guard_context(request: &Request) -> Result<(AppState, AuthUser), ApiError> {
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
    Ok((state, actor))
}

/// Run one authorization lookup under the configured deadline.
///
/// A store error or a timeout denies the request; an outage must never
/// widen access.
pub(crate) async fn authorized<F, T>(lookup: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match timeout(config::config().security.authz_timeout(), lookup).await {
        Ok(Ok(allowed)) => Ok(allowed),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Authorization lookup failed, denying request");
            Err(ApiError::forbidden("Authorization check failed"))
        }
        Err(_) => {
            tracing::warn!("Authorization lookup timed out, denying request");
            Err(ApiError::forbidden("Authorization check failed"))
        }
    }
}
