use uuid::Uuid;

use crate::config;
use crate::database::SharedStore;

/// Record an access denial without blocking the response.
///
/// The denial is always logged; the database write runs on a spawned task
/// so a slow or failing audit store can never turn a 403 into a 500.
pub fn emit_denial(store: &SharedStore, actor_id: Option<Uuid>, resource: &str, reason: &str) {
    tracing::warn!(
        actor = ?actor_id,
        resource = resource,
        reason = reason,
        "Access denied"
    );

    if !config::config().security.enable_audit_logging {
        return;
    }

    let store = store.clone();
    let resource = resource.to_string();
    let reason = reason.to_string();
    tokio::spawn(async move {
        if let Err(e) = store.record_denial(actor_id, &resource, &reason).await {
            tracing::error!(error = %e, "Failed to persist access denial");
        }
    });
}
