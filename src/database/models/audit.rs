use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One recorded authorization denial.
///
/// Written by a fire-and-forget sink; losing an entry must never change the
/// outcome of the request that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AccessDenialEvent {
    pub id: i64,
    pub actor_id: Option<Uuid>,
    pub resource: String,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}
