use serde_json::json;

use crate::cli::utils::{connect_state, output_success};
use crate::cli::OutputFormat;

/// `atrio seed` - create the schema, seed the role/permission catalog and
/// re-assert the super-admin grant set. Safe to run repeatedly.
pub async fn seed(output_format: OutputFormat) -> anyhow::Result<()> {
    let state = connect_state().await?;
    state.catalog.initialize().await?;

    let roles = state.catalog.all_roles().await?;
    let permissions = state.catalog.all_permissions().await?;

    output_success(
        &output_format,
        "Catalog seeded",
        Some(json!({
            "roles": roles.len(),
            "permissions": permissions.len(),
        })),
    )
}
