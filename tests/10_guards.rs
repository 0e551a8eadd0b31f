mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::middleware::from_fn;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::{json, Value};
use tower::ServiceExt;

use atrio_authz::auth::{generate_token, Claims, TokenKind};
use atrio_authz::catalog::{seed, SUPER_ADMIN};
use atrio_authz::middleware::{
    authenticate, require_all_permissions, require_any_permission, require_super_admin,
    SuperAdminContext,
};
use common::TestApp;

#[tokio::test]
async fn health_and_banner_respond() -> Result<()> {
    let app = TestApp::new().await?;

    let (status, body) = app.get("/", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = app.get("/health", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["catalog_initialized"], true);
    Ok(())
}

#[tokio::test]
async fn missing_malformed_and_expired_tokens_share_one_401() -> Result<()> {
    let app = TestApp::new().await?;
    let user = app.user("till@example.com", None, None).await?;

    let (status, missing) = app.get("/api/admin/roles", None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, malformed) = app.get("/api/admin/roles", Some("not-a-token")).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut claims = Claims::new(&user, vec![], TokenKind::Access);
    claims.exp = claims.iat - 3600;
    let expired_token = generate_token(&claims)?;
    let (status, expired) = app.get("/api/admin/roles", Some(&expired_token)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // One body for all three: nothing reveals which check failed.
    assert_eq!(missing["success"], false);
    assert_eq!(missing["message"], "Authentication required");
    assert_eq!(missing, malformed);
    assert_eq!(missing, expired);
    Ok(())
}

#[tokio::test]
async fn super_admin_guard_is_role_table_only() -> Result<()> {
    let app = TestApp::new().await?;

    let boss = app.user("boss@example.com", None, None).await?;
    app.grant_role(&boss, SUPER_ADMIN).await?;
    let boss_token = app.token(&boss).await?;

    let admin = app.user("admin@example.com", None, None).await?;
    app.grant_role(&admin, seed::ADMIN).await?;
    let admin_token = app.token(&admin).await?;

    // Legacy column says super_admin, but no role row exists.
    let legacy = app.user("legacy@example.com", Some(SUPER_ADMIN), None).await?;
    let legacy_token = app.token(&legacy).await?;

    let (status, body) = app
        .post(
            "/api/admin/roles",
            Some(&boss_token),
            json!({"name": "campaign_manager", "description": "Runs campaigns"}),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["name"], "campaign_manager");

    let (status, body) = app
        .post("/api/admin/roles", Some(&admin_token), json!({"name": "x_role"}))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Super admin access required");

    let (status, body) = app
        .post("/api/admin/roles", Some(&legacy_token), json!({"name": "y_role"}))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Super admin access required");
    Ok(())
}

#[tokio::test]
async fn permission_guard_rechecks_live_grants() -> Result<()> {
    let app = TestApp::new().await?;

    let admin = app.user("ops@example.com", None, None).await?;
    app.grant_role(&admin, seed::ADMIN).await?;
    let token = app.token(&admin).await?;

    // Seeding grants nothing to admin; the catalog read is denied.
    let (status, body) = app.get("/api/admin/roles", Some(&token)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(
        body["message"].as_str().unwrap_or_default().contains("roles.read"),
        "denial should name the permission: {}",
        body["message"]
    );

    // Grant lands mid-session; the same token now passes.
    app.grant_permission(seed::ADMIN, "roles.read").await?;
    let (status, body) = app.get("/api/admin/roles", Some(&token)).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().is_some_and(|roles| roles.len() >= 4));
    Ok(())
}

#[tokio::test]
async fn stale_snapshot_never_authorizes() -> Result<()> {
    let app = TestApp::new().await?;
    app.grant_permission(seed::ADMIN, "users.read").await?;

    // The token claims an admin role the user does not hold.
    let pretender = app.user("pretender@example.com", None, None).await?;
    let forged = app.token_with_roles(&pretender, &[seed::ADMIN]);

    let (status, _) = app.get("/api/admin/users", Some(&forged)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn permissions_union_across_roles() -> Result<()> {
    let app = TestApp::new().await?;

    let reporting = app.state.catalog.create_role("reporting", None).await?;
    let staffing = app.state.catalog.create_role("staffing", None).await?;
    app.grant_permission("reporting", "roles.read").await?;
    app.grant_permission("staffing", "users.read").await?;

    let analyst = app.user("analyst@example.com", None, None).await?;
    app.state
        .assignments
        .assign_role(analyst.id, reporting.id, None)
        .await?;
    app.state
        .assignments
        .assign_role(analyst.id, staffing.id, None)
        .await?;
    let token = app.token(&analyst).await?;

    let (status, _) = app.get("/api/admin/roles", Some(&token)).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/api/admin/users", Some(&token)).await?;
    assert_eq!(status, StatusCode::OK);

    // Explicit deny on one edge reads the same as no grant.
    let roles_read = app
        .state
        .store
        .permission_by_name("roles.read")
        .await?
        .expect("seeded permission");
    app.state
        .catalog
        .set_grant(reporting.id, roles_read.id, false)
        .await?;
    let (status, _) = app.get("/api/admin/roles", Some(&token)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn client_management_accepts_super_admin_or_listed_roles() -> Result<()> {
    let app = TestApp::new().await?;

    let agent = app.user("agent@example.com", None, None).await?;
    app.grant_role(&agent, seed::AGENT).await?;
    let agent_token = app.token(&agent).await?;

    let boss = app.user("boss@example.com", None, None).await?;
    app.grant_role(&boss, SUPER_ADMIN).await?;
    let boss_token = app.token(&boss).await?;

    let outsider = app.user("outsider@example.com", None, None).await?;
    let outsider_token = app.token(&outsider).await?;

    let (status, _) = app
        .post("/api/admin/clients", Some(&agent_token), json!({"name": "Acme"}))
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .post("/api/admin/clients", Some(&boss_token), json!({"name": "Globex"}))
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .post("/api/admin/clients", Some(&outsider_token), json!({"name": "Nope"}))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let message = body["message"].as_str().unwrap_or_default();
    assert!(message.contains("admin") && message.contains("agent"), "{}", message);
    Ok(())
}

#[tokio::test]
async fn client_management_honors_legacy_roles_without_role_rows() -> Result<()> {
    let app = TestApp::new().await?;

    // Pre-migration account: the legacy column is all it has.
    let holdover = app
        .user("holdover@example.com", Some(seed::ADMIN), None)
        .await?;
    let holdover_token = app.token(&holdover).await?;
    let (status, _) = app
        .post(
            "/api/admin/clients",
            Some(&holdover_token),
            json!({"name": "Initech"}),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    // A role row ends the fallback, whatever the column still says.
    let migrated = app
        .user("migrated@example.com", Some(seed::ADMIN), None)
        .await?;
    app.grant_role(&migrated, seed::USER).await?;
    let migrated_token = app.token(&migrated).await?;
    let (status, body) = app
        .post(
            "/api/admin/clients",
            Some(&migrated_token),
            json!({"name": "Hooli"}),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["message"],
        "Access requires super admin or one of roles: admin, agent"
    );

    // A legacy super_admin string alone confers nothing here either.
    let relic = app.user("relic@example.com", Some(SUPER_ADMIN), None).await?;
    let relic_token = app.token(&relic).await?;
    let (status, _) = app
        .post(
            "/api/admin/clients",
            Some(&relic_token),
            json!({"name": "Umbrella"}),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn guard_denials_land_in_the_audit_log() -> Result<()> {
    let app = TestApp::new().await?;

    let outsider = app.user("curious@example.com", None, None).await?;
    let token = app.token(&outsider).await?;

    let (status, _) = app.get("/api/admin/integrity", Some(&token)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let events = app.wait_for_denials(1).await?;
    let event = &events[0];
    assert_eq!(event.resource, "/api/admin/integrity");
    assert_eq!(event.actor_id, Some(outsider.id));
    assert!(event.reason.contains("system.view_health"));
    Ok(())
}

#[tokio::test]
async fn role_assignment_round_trip_is_idempotent() -> Result<()> {
    let app = TestApp::new().await?;

    let boss = app.user("boss@example.com", None, None).await?;
    app.grant_role(&boss, SUPER_ADMIN).await?;
    let token = app.token(&boss).await?;

    let target = app.user("newhire@example.com", None, None).await?;
    let agent_role = app
        .state
        .catalog
        .role_by_name(seed::AGENT)
        .await?
        .expect("seeded role");

    let uri = format!("/api/admin/users/{}/roles/{}", target.id, agent_role.id);

    let (status, body) = app.post(&uri, Some(&token), json!({})).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["created"], true);

    let (status, body) = app.post(&uri, Some(&token), json!({})).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["created"], false);

    let (status, body) = app
        .get(&format!("/api/admin/users/{}/roles", target.id), Some(&token))
        .await?;
    assert_eq!(status, StatusCode::OK);
    let roles = body["data"].as_array().expect("role list");
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0]["name"], seed::AGENT);

    let (status, body) = app.delete(&uri, Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["removed"], true);

    let (status, body) = app.delete(&uri, Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["removed"], false);
    Ok(())
}

/// Drive one authenticated GET through a router built in the test, for
/// guards the application does not mount on a route of its own.
async fn probe(router: Router, uri: &str, token: &str) -> Result<(StatusCode, Value)> {
    let request = Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())?;
    let response = router.oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, serde_json::from_slice(&bytes)?))
}

#[tokio::test]
async fn any_of_guard_accepts_a_single_held_permission() -> Result<()> {
    let app = TestApp::new().await?;
    let router = Router::new()
        .route(
            "/settings",
            get(|| async { Json(json!({"ok": true})) }).route_layer(from_fn(
                require_any_permission(&["settings.read", "settings.update"]),
            )),
        )
        .route_layer(from_fn(authenticate))
        .layer(Extension(app.state.clone()));

    let clerk = app.user("clerk@example.com", None, None).await?;
    app.grant_role(&clerk, seed::AGENT).await?;
    app.grant_permission(seed::AGENT, "settings.read").await?;
    let clerk_token = app.token(&clerk).await?;

    let outsider = app.user("outsider@example.com", None, None).await?;
    let outsider_token = app.token(&outsider).await?;

    let (status, body) = probe(router.clone(), "/settings", &clerk_token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (status, body) = probe(router, "/settings", &outsider_token).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["message"],
        "Permission denied: requires one of settings.read, settings.update"
    );
    Ok(())
}

#[tokio::test]
async fn all_of_guard_denies_on_the_first_missing_permission() -> Result<()> {
    let app = TestApp::new().await?;
    let router = Router::new()
        .route(
            "/settings",
            get(|| async { Json(json!({"ok": true})) }).route_layer(from_fn(
                require_all_permissions(&["settings.read", "settings.update"]),
            )),
        )
        .route_layer(from_fn(authenticate))
        .layer(Extension(app.state.clone()));

    let editor = app.user("editor@example.com", None, None).await?;
    app.grant_role(&editor, seed::AGENT).await?;
    app.grant_permission(seed::AGENT, "settings.read").await?;
    let token = app.token(&editor).await?;

    let (status, body) = probe(router.clone(), "/settings", &token).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Permission denied: settings.update is required");

    app.grant_permission(seed::AGENT, "settings.update").await?;
    let (status, body) = probe(router, "/settings", &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    Ok(())
}

#[tokio::test]
async fn super_admin_context_carries_the_verified_identity() -> Result<()> {
    let app = TestApp::new().await?;
    let router = Router::new()
        .route(
            "/whoami-admin",
            get(|Extension(ctx): Extension<SuperAdminContext>| async move {
                Json(json!({"user_id": ctx.user_id, "email": ctx.email}))
            })
            .route_layer(from_fn(require_super_admin())),
        )
        .route_layer(from_fn(authenticate))
        .layer(Extension(app.state.clone()));

    let boss = app.user("boss@example.com", None, None).await?;
    app.grant_role(&boss, SUPER_ADMIN).await?;
    let token = app.token(&boss).await?;

    let (status, body) = probe(router, "/whoami-admin", &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], boss.id.to_string());
    assert_eq!(body["email"], "boss@example.com");
    Ok(())
}
