//! Multi-tenant integrity auditor.
//!
//! Out-of-band scan for violations the request-time guards cannot see:
//! historical rows, migration artifacts, manual edits. Checks run
//! concurrently, never abort each other, and a check that cannot run is
//! itself reported as a failure.

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::SharedStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub verdict: Verdict,
    pub detail: String,
}

impl CheckResult {
    fn pass(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            verdict: Verdict::Pass,
            detail: detail.into(),
        }
    }

    fn warn(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            verdict: Verdict::Warn,
            detail: detail.into(),
        }
    }

    fn fail(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            verdict: Verdict::Fail,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub warnings: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub status: HealthStatus,
    pub checks: Vec<CheckResult>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub summary: ReportSummary,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationCheck {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationReport {
    pub passed: bool,
    pub probe_key: String,
    pub checks: Vec<IsolationCheck>,
}

const PROBE_KIND: &str = "isolation_probe";

pub struct IntegrityService {
    store: SharedStore,
}

impl IntegrityService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Run all checks concurrently and fold the verdicts. Any FAIL makes
    /// the system CRITICAL; otherwise any WARN makes it WARNING.
    pub async fn run_audit(&self) -> IntegrityReport {
        let checks = join_all([
            self.check_missing_scope().boxed(),
            self.check_scope_fk_consistency().boxed(),
            self.check_per_tenant_uniqueness().boxed(),
            self.check_cross_tenant_ids().boxed(),
            self.check_membership_coverage().boxed(),
            self.check_scope_indexes().boxed(),
            self.check_audit_activity().boxed(),
        ])
        .await;

        let errors: Vec<String> = checks
            .iter()
            .filter(|c| c.verdict == Verdict::Fail)
            .map(|c| format!("{}: {}", c.name, c.detail))
            .collect();
        let warnings: Vec<String> = checks
            .iter()
            .filter(|c| c.verdict == Verdict::Warn)
            .map(|c| format!("{}: {}", c.name, c.detail))
            .collect();
        let summary = ReportSummary {
            total: checks.len(),
            passed: checks.iter().filter(|c| c.verdict == Verdict::Pass).count(),
            failed: errors.len(),
            warnings: warnings.len(),
        };
        let status = if !errors.is_empty() {
            HealthStatus::Critical
        } else if !warnings.is_empty() {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        };

        match status {
            HealthStatus::Critical => {
                tracing::error!(failed = summary.failed, "integrity audit found violations")
            }
            HealthStatus::Warning => {
                tracing::warn!(warnings = summary.warnings, "integrity audit found warnings")
            }
            HealthStatus::Healthy => tracing::info!("integrity audit clean"),
        }

        IntegrityReport {
            status,
            checks,
            errors,
            warnings,
            summary,
            generated_at: Utc::now(),
        }
    }

    async fn check_missing_scope(&self) -> CheckResult {
        const NAME: &str = "missing_scope";
        match self.store.count_resources_missing_scope().await {
            Ok(0) => CheckResult::pass(NAME, "all tenant-scoped rows carry both scope columns"),
            Ok(n) => CheckResult::fail(NAME, format!("{} rows missing client or project scope", n)),
            Err(e) => CheckResult::fail(NAME, format!("check could not run: {}", e)),
        }
    }

    async fn check_scope_fk_consistency(&self) -> CheckResult {
        const NAME: &str = "scope_fk_consistency";
        match self.store.count_scope_fk_mismatches().await {
            Ok(0) => CheckResult::pass(NAME, "every row's project belongs to the row's client"),
            Ok(n) => CheckResult::fail(
                NAME,
                format!("{} rows whose project belongs to a different client", n),
            ),
            Err(e) => CheckResult::fail(NAME, format!("check could not run: {}", e)),
        }
    }

    async fn check_per_tenant_uniqueness(&self) -> CheckResult {
        const NAME: &str = "per_tenant_uniqueness";
        match self.store.duplicate_scoped_keys().await {
            Ok(groups) if groups.is_empty() => {
                CheckResult::pass(NAME, "no duplicate logical keys within any scope")
            }
            Ok(groups) => {
                let sample: Vec<String> = groups
                    .iter()
                    .take(3)
                    .map(|g| format!("{}/{}", g.kind, g.logical_key))
                    .collect();
                CheckResult::fail(
                    NAME,
                    format!(
                        "{} duplicate key groups (e.g. {})",
                        groups.len(),
                        sample.join(", ")
                    ),
                )
            }
            Err(e) => CheckResult::fail(NAME, format!("check could not run: {}", e)),
        }
    }

    async fn check_cross_tenant_ids(&self) -> CheckResult {
        const NAME: &str = "cross_tenant_ids";
        match self.store.count_cross_tenant_id_collisions().await {
            Ok(0) => CheckResult::pass(NAME, "no row id appears under more than one client"),
            Ok(n) => CheckResult::fail(NAME, format!("{} row ids shared across clients", n)),
            Err(e) => CheckResult::fail(NAME, format!("check could not run: {}", e)),
        }
    }

    async fn check_membership_coverage(&self) -> CheckResult {
        const NAME: &str = "membership_coverage";
        match self.store.count_active_users_without_membership().await {
            Ok(0) => CheckResult::pass(NAME, "every active non-administrative user has a project"),
            Ok(n) => CheckResult::warn(
                NAME,
                format!("{} active non-administrative users without project membership", n),
            ),
            Err(e) => CheckResult::fail(NAME, format!("check could not run: {}", e)),
        }
    }

    async fn check_scope_indexes(&self) -> CheckResult {
        const NAME: &str = "scope_indexes";
        match self.store.tables_missing_scope_index().await {
            Ok(missing) if missing.is_empty() => {
                CheckResult::pass(NAME, "scope indexes present on hot tables")
            }
            Ok(missing) => CheckResult::warn(
                NAME,
                format!("missing (client_id, project_id) index on: {}", missing.join(", ")),
            ),
            Err(e) => CheckResult::fail(NAME, format!("check could not run: {}", e)),
        }
    }

    async fn check_audit_activity(&self) -> CheckResult {
        const NAME: &str = "audit_activity";
        let cutoff = Utc::now() - Duration::hours(24);
        match self.store.count_denials_since(cutoff).await {
            Ok(0) => CheckResult::warn(
                NAME,
                "no denial log entries in 24h; the audit pipeline may be broken",
            ),
            Ok(n) => CheckResult::pass(NAME, format!("{} denial log entries in 24h", n)),
            Err(e) => CheckResult::fail(NAME, format!("check could not run: {}", e)),
        }
    }

    /// Live probe: write one throwaway row under the given scope, verify it
    /// is visible in-scope and invisible from two out-of-scope queries, then
    /// delete it. Safe to run periodically against production.
    pub async fn test_data_isolation(
        &self,
        client_id: i64,
        project_id: i64,
        test_user_id: Uuid,
    ) -> IsolationReport {
        let probe_key = format!("probe-{}", Uuid::new_v4());
        self.run_isolation_probe(client_id, project_id, test_user_id, probe_key)
            .await
    }

    async fn run_isolation_probe(
        &self,
        client_id: i64,
        project_id: i64,
        test_user_id: Uuid,
        probe_key: String,
    ) -> IsolationReport {
        let mut checks = Vec::new();

        let inserted = self
            .store
            .insert_resource(crate::database::store::NewResource {
                client_id: Some(client_id),
                project_id: Some(project_id),
                kind: PROBE_KIND,
                logical_key: &probe_key,
                payload: serde_json::json!({ "probe": true }),
                created_by: Some(test_user_id),
            })
            .await;

        match inserted {
            Ok(_) => {
                checks.push(IsolationCheck {
                    name: "insert_probe".to_string(),
                    passed: true,
                    detail: format!("probe row written under ({}, {})", client_id, project_id),
                });
                checks.push(
                    self.probe_count("in_scope_visible", &probe_key, client_id, project_id, 1)
                        .await,
                );
                checks.push(
                    self.probe_count(
                        "wrong_project_invisible",
                        &probe_key,
                        client_id,
                        project_id + 1,
                        0,
                    )
                    .await,
                );
                checks.push(
                    self.probe_count(
                        "wrong_client_invisible",
                        &probe_key,
                        client_id + 1,
                        project_id,
                        0,
                    )
                    .await,
                );
            }
            Err(e) => checks.push(IsolationCheck {
                name: "insert_probe".to_string(),
                passed: false,
                detail: format!("probe insert failed: {}", e),
            }),
        }

        // Cleanup always runs, whatever the sub-checks said.
        let cleanup = match self
            .store
            .delete_resources_by_key(PROBE_KIND, &probe_key)
            .await
        {
            Ok(n) => IsolationCheck {
                name: "cleanup".to_string(),
                passed: true,
                detail: format!("{} probe rows removed", n),
            },
            Err(e) => IsolationCheck {
                name: "cleanup".to_string(),
                passed: false,
                detail: format!("probe cleanup failed: {}", e),
            },
        };
        checks.push(cleanup);

        let report = IsolationReport {
            passed: checks.iter().all(|c| c.passed),
            probe_key,
            checks,
        };
        if !report.passed {
            tracing::error!(probe_key = %report.probe_key, "isolation probe failed");
        }
        report
    }

    async fn probe_count(
        &self,
        name: &str,
        probe_key: &str,
        client_id: i64,
        project_id: i64,
        expected: i64,
    ) -> IsolationCheck {
        match self
            .store
            .count_resources_in_scope(PROBE_KIND, probe_key, client_id, project_id)
            .await
        {
            Ok(count) => IsolationCheck {
                name: name.to_string(),
                passed: count == expected,
                detail: format!(
                    "({}, {}) returned {} rows, expected {}",
                    client_id, project_id, count, expected
                ),
            },
            Err(e) => IsolationCheck {
                name: name.to_string(),
                passed: false,
                detail: format!("count query failed: {}", e),
            },
        }
    }
}
