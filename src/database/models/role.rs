use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Seeded roles are system roles and cannot be deleted.
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
}

/// One user_roles edge.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRole {
    pub user_id: Uuid,
    pub role_id: i64,
    pub assigned_by: Option<Uuid>,
    pub assigned_at: DateTime<Utc>,
}

/// Role joined with its assignment edge, as listed for a single user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AssignedRole {
    pub role_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub assigned_at: DateTime<Utc>,
}
