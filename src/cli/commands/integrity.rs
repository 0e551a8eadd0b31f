use uuid::Uuid;

use crate::cli::utils::connect_state;
use crate::cli::OutputFormat;
use crate::services::{HealthStatus, Verdict};

/// `atrio audit` - run every integrity check and print the report.
///
/// Exits non-zero when the report is CRITICAL so cron and CI can alert
/// on the exit code alone.
pub async fn audit(output_format: OutputFormat) -> anyhow::Result<()> {
    let state = connect_state().await?;
    let report = state.integrity.run_audit().await;

    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!("Integrity audit - {}", report.generated_at.to_rfc3339());
            println!("{}", "-".repeat(72));
            for check in &report.checks {
                let verdict = match check.verdict {
                    Verdict::Pass => "PASS",
                    Verdict::Warn => "WARN",
                    Verdict::Fail => "FAIL",
                };
                println!("[{:<4}] {:<24} {}", verdict, check.name, check.detail);
            }
            println!("{}", "-".repeat(72));
            println!(
                "Status: {:?}  ({} checks, {} passed, {} failed, {} warnings)",
                report.status,
                report.summary.total,
                report.summary.passed,
                report.summary.failed,
                report.summary.warnings
            );
        }
    }

    if report.status == HealthStatus::Critical {
        anyhow::bail!("integrity status is CRITICAL");
    }
    Ok(())
}

/// `atrio isolation-test` - run the live data isolation probe.
pub async fn isolation_test(
    client_id: i64,
    project_id: i64,
    user_email: Option<String>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let state = connect_state().await?;

    let project = state
        .store
        .project_by_id(project_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("project {} not found", project_id))?;
    if project.client_id != client_id {
        anyhow::bail!(
            "project {} belongs to client {}, not {}",
            project_id,
            project.client_id,
            client_id
        );
    }

    let test_user_id = match user_email {
        Some(email) => {
            let email = email.trim().to_lowercase();
            state
                .store
                .find_user_by_email(&email)
                .await?
                .map(|u| u.id)
                .ok_or_else(|| anyhow::anyhow!("no user with email {}", email))?
        }
        None => Uuid::new_v4(),
    };

    let report = state
        .integrity
        .test_data_isolation(client_id, project_id, test_user_id)
        .await;

    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!("Isolation probe {}", report.probe_key);
            for check in &report.checks {
                let mark = if check.passed { "ok" } else { "FAIL" };
                println!("[{:<4}] {:<24} {}", mark, check.name, check.detail);
            }
        }
    }

    if !report.passed {
        anyhow::bail!("isolation probe failed");
    }
    Ok(())
}
