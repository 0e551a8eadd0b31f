use std::sync::Arc;

use atrio_authz::database::PgAuthStore;
use atrio_authz::state::AppState;
use atrio_authz::{app, config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL and friends.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = config::config();
    tracing::info!(environment = ?cfg.environment, "Starting atrio-authz");

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

    let store = PgAuthStore::connect(&database_url).await?;
    store.ensure_schema().await?;

    let state = AppState::new(Arc::new(store));
    state.catalog.initialize().await?;

    let port = std::env::var("ATRIO_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);
    let bind_addr = format!("0.0.0.0:{}", port);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "Listening");

    axum::serve(listener, app(state)).await?;
    Ok(())
}
