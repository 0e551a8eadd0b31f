use serde_json::json;

use crate::catalog::SUPER_ADMIN;
use crate::cli::utils::{connect_state, output_success};
use crate::cli::OutputFormat;
use crate::config;
use crate::database::store::NewUser;

/// `atrio create-user` - provision an account directly in the database.
/// Used for bootstrap, before any super admin exists to call the API.
pub async fn create_user(
    email: String,
    password: String,
    display_name: String,
    client_id: Option<i64>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let email = email.trim().to_lowercase();
    if !email.contains('@') {
        anyhow::bail!("a valid email address is required");
    }
    if password.len() < 8 {
        anyhow::bail!("password must be at least 8 characters");
    }

    let state = connect_state().await?;
    let password_hash = bcrypt::hash(&password, config::config().security.bcrypt_cost)?;

    let user = state
        .store
        .insert_user(NewUser {
            email: &email,
            password_hash: &password_hash,
            display_name: display_name.trim(),
            role: None,
            client_id,
        })
        .await?;

    output_success(
        &output_format,
        "User created",
        Some(json!({
            "id": user.id,
            "email": user.email,
        })),
    )
}

/// `atrio grant-super-admin` - put an account on the super_admin role.
pub async fn grant_super_admin(email: String, output_format: OutputFormat) -> anyhow::Result<()> {
    let email = email.trim().to_lowercase();

    let state = connect_state().await?;
    state.catalog.initialize().await?;

    let user = state
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no user with email {}", email))?;

    let role = state
        .catalog
        .role_by_name(SUPER_ADMIN)
        .await?
        .ok_or_else(|| anyhow::anyhow!("role {} is missing from the catalog", SUPER_ADMIN))?;

    let outcome = state
        .assignments
        .assign_role(user.id, role.id, None)
        .await?;

    let message = if outcome.created {
        "Super admin role granted"
    } else {
        "User already holds the super admin role"
    };
    output_success(
        &output_format,
        message,
        Some(json!({
            "user_id": user.id,
            "role_id": role.id,
        })),
    )
}
