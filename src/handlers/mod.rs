// Handler tiers: public (no auth), protected (access token),
// admin (access token + guard), tenant (access token + validated scope).

pub mod admin;
pub mod protected;
pub mod public;
pub mod tenant;

use axum::response::Json;
use serde_json::{json, Value};

use crate::middleware::{ApiResult, ApiResponse};
use crate::state::AppState;
use axum::Extension;

/// GET / - service banner.
pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "atrio-authz",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok"
    }))
}

/// GET /health - liveness plus a store round-trip.
pub async fn health(Extension(state): Extension<AppState>) -> ApiResult<Value> {
    state.store.ping().await?;
    Ok(ApiResponse::success(json!({
        "healthy": true,
        "catalog_initialized": state.catalog.is_initialized()
    })))
}
