use std::sync::Arc;

use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::database::PgAuthStore;
use crate::state::AppState;

/// Connect to the database named by `DATABASE_URL` and build the service
/// stack the commands run against.
pub async fn connect_state() -> anyhow::Result<AppState> {
    let url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let store = PgAuthStore::connect(&url).await?;
    store.ensure_schema().await?;
    Ok(AppState::new(Arc::new(store)))
}

/// Print a success line in the requested format.
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });
            if let Some(Value::Object(map)) = data {
                response
                    .as_object_mut()
                    .expect("response is an object")
                    .extend(map);
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
            if let Some(data_value) = data {
                println!("{}", serde_json::to_string_pretty(&data_value)?);
            }
        }
    }
    Ok(())
}
