use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    /// Stored and matched lowercase.
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub display_name: String,
    /// Legacy single-role column from before the role table existed.
    /// Role-table assignments always take precedence over it.
    pub role: Option<String>,
    /// Tenant binding. Administrative accounts carry no binding.
    pub client_id: Option<i64>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
