pub mod auth;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod state;

use axum::{
    middleware::from_fn,
    routing::{delete, get, post, put},
    Extension, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{authenticate, guards, validate_scope};
use crate::state::AppState;

/// Build the full application router.
///
/// Takes the state explicitly so integration tests can run the same
/// router against an in-memory store.
pub fn app(state: AppState) -> Router {
    let cfg = config::config();

    let mut router = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .merge(auth_public_routes())
        .merge(session_routes())
        .merge(admin_routes())
        .merge(tenant_routes())
        .layer(Extension(state));

    if cfg.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    if cfg.api.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }
    router
}

fn auth_public_routes() -> Router {
    use handlers::public::auth;

    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
}

fn session_routes() -> Router {
    use handlers::protected::auth;

    Router::new()
        .route("/api/auth/whoami", get(auth::whoami))
        .route("/api/auth/session", delete(auth::logout))
        .route_layer(from_fn(authenticate))
}

fn admin_routes() -> Router {
    use crate::catalog::seed::{ADMIN, AGENT};
    use handlers::admin::{denials, integrity, permissions, roles, tenants, users};

    Router::new()
        // Catalog reads need only the read permission; mutations are super
        // admin territory.
        .route(
            "/api/admin/roles",
            get(roles::list_roles).route_layer(from_fn(guards::require_permission("roles.read"))),
        )
        .route(
            "/api/admin/roles",
            post(roles::create_role).route_layer(from_fn(guards::require_super_admin())),
        )
        .route(
            "/api/admin/roles/:role_id",
            delete(roles::delete_role).route_layer(from_fn(guards::require_super_admin())),
        )
        .route(
            "/api/admin/roles/:role_id/permissions",
            get(roles::role_grants).route_layer(from_fn(guards::require_permission("roles.read"))),
        )
        .route(
            "/api/admin/roles/:role_id/permissions/:permission_id",
            put(roles::set_role_grant).route_layer(from_fn(guards::require_super_admin())),
        )
        .route(
            "/api/admin/permissions",
            get(permissions::list_permissions)
                .route_layer(from_fn(guards::require_permission("roles.read"))),
        )
        .route(
            "/api/admin/permissions",
            post(permissions::create_permission)
                .route_layer(from_fn(guards::require_super_admin())),
        )
        .route(
            "/api/admin/users",
            get(users::list_users).route_layer(from_fn(guards::require_permission("users.read"))),
        )
        .route(
            "/api/admin/users",
            post(users::create_user)
                .route_layer(from_fn(guards::require_permission("users.create"))),
        )
        .route(
            "/api/admin/users/:user_id/roles",
            get(users::user_roles).route_layer(from_fn(guards::require_permission("users.read"))),
        )
        .route(
            "/api/admin/users/:user_id/roles/:role_id",
            post(users::assign_role)
                .delete(users::revoke_role)
                .route_layer(from_fn(guards::require_permission("user_management"))),
        )
        .route(
            "/api/admin/projects/:project_id/members",
            post(users::add_project_member)
                .route_layer(from_fn(guards::require_permission("user_management"))),
        )
        .route(
            "/api/admin/clients",
            get(tenants::list_clients)
                .post(tenants::create_client)
                .route_layer(from_fn(guards::require_super_admin_or_role_in(&[
                    ADMIN, AGENT,
                ]))),
        )
        .route(
            "/api/admin/clients/:client_id/projects",
            get(tenants::list_projects)
                .post(tenants::create_project)
                .route_layer(from_fn(guards::require_super_admin_or_role_in(&[
                    ADMIN, AGENT,
                ]))),
        )
        .route(
            "/api/admin/integrity",
            get(integrity::integrity_report)
                .route_layer(from_fn(guards::require_permission("system.view_health"))),
        )
        .route(
            "/api/admin/integrity/isolation-test",
            post(integrity::isolation_test).route_layer(from_fn(guards::require_super_admin())),
        )
        .route(
            "/api/admin/logs/denials",
            get(denials::recent_denials)
                .route_layer(from_fn(guards::require_permission("platform.logs.read"))),
        )
        .route_layer(from_fn(authenticate))
}

fn tenant_routes() -> Router {
    use handlers::tenant::resources;

    Router::new()
        .route(
            "/api/clients/:client_id/projects/:project_id/resources",
            get(resources::list_resources).post(resources::create_resource),
        )
        .route(
            "/api/clients/:client_id/projects/:project_id/resources/:resource_id",
            get(resources::get_resource).delete(resources::delete_resource),
        )
        .route_layer(from_fn(validate_scope))
        .route_layer(from_fn(authenticate))
}
