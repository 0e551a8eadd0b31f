mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};

use atrio_authz::catalog::seed;
use atrio_authz::database::store::NewResource;
use common::TestApp;

fn check<'a>(report: &'a Value, name: &str) -> &'a Value {
    report["checks"]
        .as_array()
        .expect("checks array")
        .iter()
        .find(|c| c["name"] == name)
        .unwrap_or_else(|| panic!("missing check {}", name))
}

/// Super admin plus enough hygiene that every audit check passes: all
/// non-administrative users hold a membership and the denial log is warm.
async fn healthy_baseline(app: &TestApp) -> Result<String> {
    let boss = app.user("boss@agency.com", None, None).await?;
    app.grant_role(&boss, seed::SUPER_ADMIN).await?;
    app.state
        .store
        .record_denial(None, "/api/admin/integrity", "warmup entry")
        .await?;
    app.token(&boss).await
}

#[tokio::test]
async fn integrity_endpoint_is_permission_gated() -> Result<()> {
    let app = TestApp::new().await?;
    let (client, project) = app.client_project("Acme", "Spring Launch").await?;
    let member = app.user("member@acme.com", None, Some(client.id)).await?;
    app.member_of(&member, project.id).await?;

    let member_token = app.token(&member).await?;
    let (status, body) = app.get("/api/admin/integrity", Some(&member_token)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Permission denied: system.view_health is required");

    let token = healthy_baseline(&app).await?;
    let (status, _) = app.get("/api/admin/integrity", Some(&token)).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn clean_deployment_reports_healthy() -> Result<()> {
    let app = TestApp::new().await?;
    let token = healthy_baseline(&app).await?;

    let (client, project) = app.client_project("Acme", "Spring Launch").await?;
    let member = app.user("member@acme.com", None, Some(client.id)).await?;
    app.member_of(&member, project.id).await?;

    let (status, body) = app.get("/api/admin/integrity", Some(&token)).await?;
    assert_eq!(status, StatusCode::OK);

    let report = &body["data"];
    assert_eq!(report["status"], "HEALTHY", "report: {}", report);
    assert_eq!(report["summary"]["total"], 7);
    assert_eq!(report["summary"]["passed"], 7);
    assert_eq!(report["summary"]["failed"], 0);
    assert_eq!(report["summary"]["warnings"], 0);
    assert_eq!(report["errors"], json!([]));
    assert_eq!(report["warnings"], json!([]));
    assert!(report["generated_at"].is_string());
    Ok(())
}

#[tokio::test]
async fn orphaned_and_mismatched_rows_are_critical() -> Result<()> {
    let app = TestApp::new().await?;
    let token = healthy_baseline(&app).await?;
    let (acme, _) = app.client_project("Acme", "Spring Launch").await?;
    let (_, globex_project) = app.client_project("Globex", "Rebrand").await?;

    // One row with no scope at all, one pointing at another client's project.
    app.state
        .store
        .insert_resource(NewResource {
            client_id: None,
            project_id: None,
            kind: "campaign",
            logical_key: "orphan",
            payload: json!({}),
            created_by: None,
        })
        .await?;
    app.state
        .store
        .insert_resource(NewResource {
            client_id: Some(acme.id),
            project_id: Some(globex_project.id),
            kind: "campaign",
            logical_key: "crossed-wires",
            payload: json!({}),
            created_by: None,
        })
        .await?;

    let (status, body) = app.get("/api/admin/integrity", Some(&token)).await?;
    assert_eq!(status, StatusCode::OK);

    let report = &body["data"];
    assert_eq!(report["status"], "CRITICAL");
    assert_eq!(check(report, "missing_scope")["verdict"], "fail");
    assert_eq!(check(report, "scope_fk_consistency")["verdict"], "fail");
    assert_eq!(report["summary"]["failed"], 2);

    let errors = report["errors"].as_array().expect("errors");
    assert!(errors.iter().any(|e| {
        e.as_str().is_some_and(|s| s.starts_with("missing_scope:"))
    }));
    assert!(errors.iter().any(|e| {
        e.as_str().is_some_and(|s| s.starts_with("scope_fk_consistency:"))
    }));
    Ok(())
}

#[tokio::test]
async fn duplicate_keys_within_a_scope_are_critical() -> Result<()> {
    let app = TestApp::new().await?;
    let token = healthy_baseline(&app).await?;
    let (client, project) = app.client_project("Acme", "Spring Launch").await?;

    for _ in 0..2 {
        app.state
            .store
            .insert_resource(NewResource {
                client_id: Some(client.id),
                project_id: Some(project.id),
                kind: "campaign",
                logical_key: "newsletter",
                payload: json!({}),
                created_by: None,
            })
            .await?;
    }

    let (_, body) = app.get("/api/admin/integrity", Some(&token)).await?;
    let report = &body["data"];
    assert_eq!(report["status"], "CRITICAL");
    let uniqueness = check(report, "per_tenant_uniqueness");
    assert_eq!(uniqueness["verdict"], "fail");
    assert!(uniqueness["detail"]
        .as_str()
        .is_some_and(|d| d.contains("campaign/newsletter")));
    Ok(())
}

#[tokio::test]
async fn membership_gaps_warn_without_failing() -> Result<()> {
    let app = TestApp::new().await?;
    let token = healthy_baseline(&app).await?;

    // Active, not administrative, no membership row anywhere.
    app.user("freelancer@example.com", None, None).await?;

    let (_, body) = app.get("/api/admin/integrity", Some(&token)).await?;
    let report = &body["data"];
    assert_eq!(report["status"], "WARNING");
    assert_eq!(check(report, "membership_coverage")["verdict"], "warn");
    assert_eq!(report["summary"]["warnings"], 1);
    assert_eq!(report["summary"]["failed"], 0);

    let warnings = report["warnings"].as_array().expect("warnings");
    assert!(warnings.iter().any(|w| {
        w.as_str().is_some_and(|s| s.starts_with("membership_coverage:"))
    }));
    Ok(())
}

#[tokio::test]
async fn isolation_probe_round_trips_over_http() -> Result<()> {
    let app = TestApp::new().await?;
    let token = healthy_baseline(&app).await?;
    let (client, project) = app.client_project("Acme", "Spring Launch").await?;

    let (status, body) = app
        .post(
            "/api/admin/integrity/isolation-test",
            Some(&token),
            json!({"client_id": client.id, "project_id": project.id}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let report = &body["data"];
    assert_eq!(report["passed"], true, "report: {}", report);
    assert!(report["probe_key"].as_str().is_some_and(|k| !k.is_empty()));

    let checks = report["checks"].as_array().expect("probe checks");
    let names: Vec<&str> = checks.iter().filter_map(|c| c["name"].as_str()).collect();
    assert_eq!(
        names,
        [
            "insert_probe",
            "in_scope_visible",
            "wrong_project_invisible",
            "wrong_client_invisible",
            "cleanup"
        ]
    );
    assert!(checks.iter().all(|c| c["passed"] == true));

    // Guaranteed cleanup: the throwaway row is gone.
    let leftovers = app
        .state
        .store
        .list_resources(client.id, project.id, Some("isolation_probe"))
        .await?;
    assert!(leftovers.is_empty());
    Ok(())
}

#[tokio::test]
async fn isolation_probe_is_super_admin_only() -> Result<()> {
    let app = TestApp::new().await?;
    let (client, project) = app.client_project("Acme", "Spring Launch").await?;

    let admin = app.user("admin@agency.com", None, None).await?;
    app.grant_role(&admin, seed::ADMIN).await?;
    let token = app.token(&admin).await?;

    let (status, body) = app
        .post(
            "/api/admin/integrity/isolation-test",
            Some(&token),
            json!({"client_id": client.id, "project_id": project.id}),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Super admin access required");
    Ok(())
}

#[tokio::test]
async fn isolation_probe_validates_its_target() -> Result<()> {
    let app = TestApp::new().await?;
    let token = healthy_baseline(&app).await?;
    let (acme, _) = app.client_project("Acme", "Spring Launch").await?;
    let (_, globex_project) = app.client_project("Globex", "Rebrand").await?;

    let (status, body) = app
        .post(
            "/api/admin/integrity/isolation-test",
            Some(&token),
            json!({"client_id": acme.id, "project_id": 9999}),
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Project not found");

    let (status, body) = app
        .post(
            "/api/admin/integrity/isolation-test",
            Some(&token),
            json!({"client_id": acme.id, "project_id": globex_project.id}),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Project does not belong to the specified client");
    Ok(())
}

#[tokio::test]
async fn denial_log_is_ordered_and_bounded() -> Result<()> {
    let app = TestApp::new().await?;
    let token = healthy_baseline(&app).await?;

    for reason in ["first", "second", "third"] {
        app.state
            .store
            .record_denial(None, "/api/admin/users", reason)
            .await?;
    }

    let (status, body) = app
        .get("/api/admin/logs/denials?limit=2", Some(&token))
        .await?;
    assert_eq!(status, StatusCode::OK);
    let events = body["data"].as_array().expect("events");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["reason"], "third");
    assert_eq!(events[1]["reason"], "second");

    let (_, body) = app.get("/api/admin/logs/denials", Some(&token)).await?;
    // Three planted plus the baseline warmup entry.
    assert_eq!(body["data"].as_array().expect("events").len(), 4);

    let outsider = app.user("outsider@example.com", None, None).await?;
    let outsider_token = app.token(&outsider).await?;
    let (status, _) = app
        .get("/api/admin/logs/denials", Some(&outsider_token))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}
